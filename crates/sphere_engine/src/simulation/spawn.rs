//! Random population setup

use rand::Rng;

use crate::bodies::{Body, BodyRegistry, Presentation};
use crate::core::SimulationConfig;
use crate::foundation::math::{random_colour, random_in_unit_box, wrap_components};

/// Spawn `config.population` bodies
///
/// Spawn index `i` is named `"i"`. The first half of the indices become
/// blocking bodies, the rest moving. Positions are a unit-box sample scaled
/// to `spawn_range - radius`, jittered by another unit-box sample, then
/// wrapped into the spawn range.
pub fn spawn_population<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> BodyRegistry {
    let blocking = config.population / 2;
    let mut registry = BodyRegistry::with_capacity(config.population - blocking, blocking);

    for index in 0..config.population {
        let radius = rng.gen_range(config.radius_min..=config.radius_max);
        let colour = random_colour(rng);
        let velocity = random_in_unit_box(rng) * config.velocity_range;
        let scattered = random_in_unit_box(rng) * (config.spawn_range - radius) + random_in_unit_box(rng);
        let position = wrap_components(&scattered, config.spawn_range);
        let info = Presentation::new(index.to_string(), colour, config.initial_health);

        if index < blocking {
            registry.push_blocking(Body::stationary(position, radius), info);
        } else {
            registry.push_moving(Body::new(position, velocity, radius), info);
        }
    }
    registry
}
