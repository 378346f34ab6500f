//! Collision-relevant body records and the handles that name them

use std::fmt;

use crate::foundation::math::Vec2;

/// Which collection a body lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyKind {
    /// Stationary obstacle; never integrates
    Blocking,
    /// Integrated and resolved every frame
    Moving,
}

/// Stable handle to a body: its kind plus its slot in that kind's collection
///
/// Ordering sorts all blocking bodies before moving ones, then by slot. The
/// grid relies on this order when it settles cells after a relocation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyRef {
    /// Collection
    pub kind: BodyKind,
    /// Index inside the collection
    pub slot: usize,
}

impl BodyRef {
    /// Handle to a moving body
    pub const fn moving(slot: usize) -> Self {
        Self { kind: BodyKind::Moving, slot }
    }

    /// Handle to a blocking body
    pub const fn blocking(slot: usize) -> Self {
        Self { kind: BodyKind::Blocking, slot }
    }

    /// Is this a moving body
    pub const fn is_moving(&self) -> bool {
        matches!(self.kind, BodyKind::Moving)
    }

    /// Signed encoding for interop: moving `slot`, blocking `-(slot + 1)`
    ///
    /// The offset keeps blocking slot 0 distinct from moving slot 0.
    pub fn signed_index(&self) -> i64 {
        let slot = i64::try_from(self.slot).unwrap_or(i64::MAX);
        match self.kind {
            BodyKind::Moving => slot,
            BodyKind::Blocking => -slot - 1,
        }
    }

    /// Inverse of [`BodyRef::signed_index`]
    pub fn from_signed_index(index: i64) -> Self {
        if index >= 0 {
            Self::moving(usize::try_from(index).unwrap_or(usize::MAX))
        } else {
            Self::blocking(usize::try_from(-(index + 1)).unwrap_or(usize::MAX))
        }
    }
}

impl fmt::Display for BodyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BodyKind::Moving => write!(f, "moving#{}", self.slot),
            BodyKind::Blocking => write!(f, "blocking#{}", self.slot),
        }
    }
}

/// Collision state of one body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Centre
    pub position: Vec2,
    /// Units per second; zero for blocking bodies
    pub velocity: Vec2,
    /// Fixed at spawn
    pub radius: f32,
}

impl Body {
    /// A moving body
    pub fn new(position: Vec2, velocity: Vec2, radius: f32) -> Self {
        Self { position, velocity, radius }
    }

    /// A stationary body
    pub fn stationary(position: Vec2, radius: f32) -> Self {
        Self::new(position, Vec2::zeros(), radius)
    }

    /// Position after `dt` seconds of free flight
    pub fn advanced(&self, dt: f32) -> Vec2 {
        self.position + self.velocity * dt
    }
}
