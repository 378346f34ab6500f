//! Math utilities and types
//!
//! Provides the vector types used by the simulation plus the handful of
//! operations the collision code needs: reflection, safe normalisation and
//! component-wise wrapping.

use rand::Rng;

pub use nalgebra::{Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type (used for presentation colours)
pub type Vec3 = Vector3<f32>;

/// Squared lengths below this are treated as zero
pub const EPSILON: f32 = 0.5e-6;

/// Returns `true` when `value` is approximately zero
#[inline]
pub fn is_zero(value: f32) -> bool {
    value.abs() < EPSILON
}

/// Normalise a vector, returning the zero vector for degenerate input
///
/// A zero-length normal must never turn into NaNs further down the
/// reflection path.
#[inline]
pub fn normalize_or_zero(v: &Vec2) -> Vec2 {
    let length_squared = v.magnitude_squared();
    if is_zero(length_squared) || !length_squared.is_finite() {
        return Vec2::zeros();
    }
    v / length_squared.sqrt()
}

/// Reflect `v` about the surface with normal `normal`
///
/// `v' = v - 2 * (v . n) * n` with `n` the normalised normal. The normal does
/// not need to be unit length; a zero normal leaves `v` unchanged.
#[inline]
pub fn reflect(v: &Vec2, normal: &Vec2) -> Vec2 {
    let n = normalize_or_zero(normal);
    v - n * (2.0 * n.dot(v))
}

/// Wrap each component into `(-span, span)` keeping its sign
///
/// Matches a truncating modulo: `2010.5 % 2000 == 10.5`, `-2010.5 % 2000 == -10.5`.
#[inline]
pub fn wrap_components(v: &Vec2, span: f32) -> Vec2 {
    if span <= 0.0 {
        return *v;
    }
    Vec2::new(v.x % span, v.y % span)
}

/// Random vector with each component uniform in `[-1, 1]`
pub fn random_in_unit_box<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0))
}

/// Random colour with each channel uniform in `[-1, 1]`
pub fn random_colour<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    )
}
