//! # Core Module
//!
//! Shared configuration used by every subsystem of the simulation.

pub mod config;

pub use config::{BoundaryMode, CollisionStrategy, Config, ConfigError, SimulationConfig};
