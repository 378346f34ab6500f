//! Spatial partitioning
//!
//! The uniform grid used for broad-phase lookup of nearby bodies, and a
//! sorted sweep index over stationary bodies.

pub mod grid;
pub mod sweep;

pub use grid::{CellId, CellMembers, GridError, GridLayout, UniformGrid};
pub use sweep::SweepIndex;
