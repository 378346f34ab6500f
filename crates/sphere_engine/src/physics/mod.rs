//! Physics module for collision detection and response
//!
//! Resolves moving spheres against walls, blocking spheres and each other,
//! and computes the per-frame update of each moving sphere.

pub mod contact;
pub mod resolver;
pub mod step;

pub use contact::{Contact, ContactRule};
pub use resolver::{
    resolve, resolver_for, BruteForceResolver, CollisionResolver, GridResolver, ResolveContext,
    SweepResolver,
};
pub use step::{step_body, step_range, ChunkOutcome, StepKind, StepOutcome, StepParams};
