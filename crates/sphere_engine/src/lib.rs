//! # Sphere Engine
//!
//! A multithreaded collision simulation of moving spheres among stationary
//! blocking spheres inside a walled square.
//!
//! ## Features
//!
//! - **Uniform Grid**: per-cell locked spatial partition with O(1) relocation
//! - **Resolver Strategies**: grid neighbourhood, x-sorted sweep, brute force
//! - **Worker Pool**: long-lived threads, one chunk of bodies each per frame
//! - **Deterministic Frames**: identical results with or without threads
//! - **Collision Log**: one line per contact, flushed to any writer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sphere_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     sphere_engine::foundation::logging::init();
//!
//!     let config = SimulationConfig::default()
//!         .with_population(2000)
//!         .with_seed(42)
//!         .with_fixed_delta(1.0 / 60.0);
//!     let output = std::fs::File::create("Output.txt")?;
//!     let mut engine = Engine::new(config)?.with_sink(WriterSink::new(output));
//!     let stats = engine.run(Some(600))?;
//!     println!("{} collisions", stats.body_contacts);
//!     Ok(())
//! }
//! ```

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;

// Simulation
pub mod bodies;
pub mod events;
pub mod physics;
pub mod scheduler;
pub mod simulation;
pub mod spatial;

mod engine;

pub use engine::{Engine, EngineError, FrameStats, StopHandle};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        bodies::{Body, BodyKind, BodyRef, BodyRegistry, Presentation},
        core::{BoundaryMode, CollisionStrategy, Config, ConfigError, SimulationConfig},
        events::{CollisionEvent, EventLog, EventSink, NullSink, WriterSink},
        foundation::{
            math::{Vec2, Vec3},
            time::{FrameTimer, Stopwatch},
        },
        simulation::{FrameReport, SimulationError, SimulationWorld, WorldBuilder},
        Engine, EngineError, FrameStats, StopHandle,
    };
}
