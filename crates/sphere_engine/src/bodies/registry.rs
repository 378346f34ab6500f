//! Homogeneous storage for moving and blocking bodies
//!
//! Collision state and presentation data are kept in parallel vectors
//! indexed by [`BodyRef::slot`]. Slots never change after construction.

use super::body::{Body, BodyKind, BodyRef};
use super::presentation::Presentation;

/// Both body collections plus their presentation records
#[derive(Debug, Clone, Default)]
pub struct BodyRegistry {
    moving: Vec<Body>,
    blocking: Vec<Body>,
    moving_info: Vec<Presentation>,
    blocking_info: Vec<Presentation>,
}

impl BodyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry with room for the given population
    pub fn with_capacity(moving: usize, blocking: usize) -> Self {
        Self {
            moving: Vec::with_capacity(moving),
            blocking: Vec::with_capacity(blocking),
            moving_info: Vec::with_capacity(moving),
            blocking_info: Vec::with_capacity(blocking),
        }
    }

    /// Add a moving body and return its handle
    pub fn push_moving(&mut self, body: Body, info: Presentation) -> BodyRef {
        self.moving.push(body);
        self.moving_info.push(info);
        BodyRef::moving(self.moving.len() - 1)
    }

    /// Add a blocking body and return its handle
    ///
    /// Blocking bodies never move, so any velocity is dropped.
    pub fn push_blocking(&mut self, body: Body, info: Presentation) -> BodyRef {
        self.blocking.push(Body::stationary(body.position, body.radius));
        self.blocking_info.push(info);
        BodyRef::blocking(self.blocking.len() - 1)
    }

    /// Collision state of any body
    ///
    /// # Panics
    /// If the handle does not come from this registry.
    pub fn body(&self, body: BodyRef) -> &Body {
        match body.kind {
            BodyKind::Moving => &self.moving[body.slot],
            BodyKind::Blocking => &self.blocking[body.slot],
        }
    }

    /// Presentation record of any body
    ///
    /// # Panics
    /// If the handle does not come from this registry.
    pub fn info(&self, body: BodyRef) -> &Presentation {
        match body.kind {
            BodyKind::Moving => &self.moving_info[body.slot],
            BodyKind::Blocking => &self.blocking_info[body.slot],
        }
    }

    /// Does the handle name a body in this registry
    pub fn contains(&self, body: BodyRef) -> bool {
        body.slot < self.len_of(body.kind)
    }

    /// All moving bodies
    pub fn moving(&self) -> &[Body] {
        &self.moving
    }

    /// Mutable moving bodies; blocking bodies are fixed after spawn
    pub fn moving_mut(&mut self) -> &mut [Body] {
        &mut self.moving
    }

    /// All blocking bodies
    pub fn blocking(&self) -> &[Body] {
        &self.blocking
    }

    /// Presentation records of moving bodies
    pub fn moving_info(&self) -> &[Presentation] {
        &self.moving_info
    }

    /// Presentation records of blocking bodies
    pub fn blocking_info(&self) -> &[Presentation] {
        &self.blocking_info
    }

    /// Number of bodies of one kind
    pub fn len_of(&self, kind: BodyKind) -> usize {
        match kind {
            BodyKind::Moving => self.moving.len(),
            BodyKind::Blocking => self.blocking.len(),
        }
    }

    /// Total number of bodies
    pub fn len(&self) -> usize {
        self.moving.len() + self.blocking.len()
    }

    /// Registry holds no bodies
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest radius among blocking bodies
    pub fn max_blocking_radius(&self) -> f32 {
        self.blocking.iter().map(|b| b.radius).fold(0.0, f32::max)
    }

    /// Every handle, blocking bodies first
    pub fn handles(&self) -> impl Iterator<Item = BodyRef> + '_ {
        (0..self.blocking.len())
            .map(BodyRef::blocking)
            .chain((0..self.moving.len()).map(BodyRef::moving))
    }
}
