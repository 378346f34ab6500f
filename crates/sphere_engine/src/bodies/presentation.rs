//! Presentation-side data: names, colours and health
//!
//! Health is the one presentation field the collision code writes. Both
//! sides of a contact may be processed by different workers in the same
//! frame, so it is stored in an atomic and only ever decremented.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::foundation::math::Vec3;

/// Signed health counter
///
/// Values below zero are a valid terminal state; the body stays in the
/// simulation.
#[derive(Debug, Default)]
pub struct Health(AtomicI32);

impl Health {
    /// Start at `value`
    pub const fn new(value: i32) -> Self {
        Self(AtomicI32::new(value))
    }

    /// Current value
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Subtract `amount` and return the resulting value
    pub fn damage(&self, amount: i32) -> i32 {
        self.0.fetch_sub(amount, Ordering::Relaxed).wrapping_sub(amount)
    }

    /// Overwrite
    pub fn set(&self, value: i32) {
        self.0.store(value, Ordering::Relaxed);
    }
}

impl Clone for Health {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

/// Display record for one body
#[derive(Debug, Clone)]
pub struct Presentation {
    /// Name used in the collision log
    pub name: String,
    /// RGB colour
    pub colour: Vec3,
    /// Remaining health
    pub health: Health,
}

impl Presentation {
    /// Create a record with the given name and starting health
    pub fn new(name: impl Into<String>, colour: Vec3, health: i32) -> Self {
        Self {
            name: name.into(),
            colour,
            health: Health::new(health),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_damage_returns_new_value_and_goes_negative() {
        let health = Health::new(30);
        assert_eq!(health.damage(20), 10);
        assert_eq!(health.damage(20), -10);
        assert_eq!(health.get(), -10);
    }

    #[test]
    fn test_concurrent_damage_is_not_lost() {
        let info = Arc::new(Presentation::new("0", Vec3::zeros(), 100_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let info = Arc::clone(&info);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        info.health.damage(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("damage thread");
        }
        assert_eq!(info.health.get(), 96_000);
    }
}
