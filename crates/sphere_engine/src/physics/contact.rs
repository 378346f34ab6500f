//! Contact tests shared by every resolver strategy

use crate::bodies::{Body, BodyRef};
use crate::foundation::math::Vec2;

/// Result of resolving one moving body for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Nothing in reach; integrate freely
    None,
    /// Position is on or past a domain wall
    Wall {
        /// Outward unit normal of the violated wall
        normal: Vec2,
    },
    /// Touching another body
    Body {
        /// The body that was hit
        other: BodyRef,
        /// Separation vector scaled by its squared length; not normalised
        normal: Vec2,
    },
}

impl Contact {
    /// Is this a body contact
    pub const fn is_body(&self) -> bool {
        matches!(self, Self::Body { .. })
    }
}

/// Wall placement and the contact threshold
///
/// Two bodies touch when the squared length of their separation is at most
/// `(r1 + r2)^2 * scale`. With the default scale of 100 this is far looser
/// than geometric overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRule {
    half_span: f32,
    scale: f32,
}

impl ContactRule {
    /// Walls at `±half_span` on both axes
    pub const fn new(half_span: f32, scale: f32) -> Self {
        Self { half_span, scale }
    }

    /// Multiplier on the squared radius sum
    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// Wall position on each axis
    pub const fn half_span(&self) -> f32 {
        self.half_span
    }

    /// Outward normal of the wall `body` is on or past, if any
    ///
    /// At a corner the wall the body is still heading into wins, checking x
    /// before y; if it heads into neither, the x wall is reported.
    pub fn wall(&self, body: &Body) -> Option<Vec2> {
        let p = body.position;
        let walls = [
            axis_wall(p.x, self.half_span).map(|sign| Vec2::new(sign, 0.0)),
            axis_wall(p.y, self.half_span).map(|sign| Vec2::new(0.0, sign)),
        ];
        let mut first = None;
        for normal in walls.into_iter().flatten() {
            if body.velocity.dot(&normal) > 0.0 {
                return Some(normal);
            }
            first.get_or_insert(normal);
        }
        first
    }

    /// Contact normal if `body` touches `other`
    pub fn touching(&self, body: &Body, other: &Body) -> Option<Vec2> {
        let v = other.position - body.position;
        let magnitude = v.magnitude_squared();
        let reach = body.radius + other.radius;
        (magnitude <= reach * reach * self.scale).then(|| v * magnitude)
    }

    /// Largest x distance at which two bodies of the given radii can touch
    pub fn reach(&self, radius_sum: f32) -> f32 {
        self.scale.sqrt() * radius_sum
    }
}

fn axis_wall(coord: f32, half_span: f32) -> Option<f32> {
    if coord >= half_span {
        Some(1.0)
    } else if coord <= -half_span {
        Some(-1.0)
    } else {
        None
    }
}
