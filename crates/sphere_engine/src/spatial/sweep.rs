//! Line-sweep index over blocking bodies
//!
//! Blocking bodies never move, so their x coordinates are sorted once at
//! world construction. A query returns the contiguous run of bodies whose x
//! lies in a window, found with two binary searches.

use crate::bodies::{BodyRef, BodyRegistry};

/// Blocking bodies sorted by ascending x
#[derive(Debug, Clone, Default)]
pub struct SweepIndex {
    xs: Vec<f32>,
    slots: Vec<usize>,
    max_radius: f32,
}

impl SweepIndex {
    /// Index every blocking body of `registry`
    pub fn build(registry: &BodyRegistry) -> Self {
        let mut order: Vec<usize> = (0..registry.blocking().len()).collect();
        let blocking = registry.blocking();
        // Ties keep slot order so the scan order is reproducible.
        order.sort_by(|&a, &b| {
            blocking[a]
                .position
                .x
                .total_cmp(&blocking[b].position.x)
                .then(a.cmp(&b))
        });
        Self {
            xs: order.iter().map(|&slot| blocking[slot].position.x).collect(),
            slots: order,
            max_radius: registry.max_blocking_radius(),
        }
    }

    /// Largest blocking radius, used to size query windows
    pub const fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Number of indexed bodies
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Index holds nothing
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Blocking bodies with `x` in `[min_x, max_x]`, in ascending x order
    pub fn window(&self, min_x: f32, max_x: f32) -> impl Iterator<Item = BodyRef> + '_ {
        let start = self.xs.partition_point(|&x| x < min_x);
        let end = self.xs.partition_point(|&x| x <= max_x).max(start);
        self.slots[start..end].iter().map(|&slot| BodyRef::blocking(slot))
    }
}
