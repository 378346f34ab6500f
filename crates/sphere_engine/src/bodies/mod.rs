//! Body registry
//!
//! Two homogeneous collections, moving and blocking bodies, addressed by
//! stable [`BodyRef`] handles.

mod body;
mod presentation;
mod registry;

pub use body::{Body, BodyKind, BodyRef};
pub use presentation::{Health, Presentation};
pub use registry::BodyRegistry;
