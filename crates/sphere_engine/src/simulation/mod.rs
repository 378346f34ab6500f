//! Simulation world
//!
//! Ties the body registry, grid, resolver and worker pool into a world that
//! can be stepped frame by frame.

mod spawn;
mod world;

#[cfg(test)]
mod tests;

pub use spawn::spawn_population;
pub use world::{FrameReport, SimulationError, SimulationWorld, WorldBuilder, WorldState};
