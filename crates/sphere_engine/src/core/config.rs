//! # Simulation Configuration
//!
//! All tunables of a simulation run in one serde-friendly structure. Every
//! field has a default, so a config file only needs to list what it changes:
//!
//! ```toml
//! population = 4000
//! partitions = 40
//! strategy = "grid"
//! multithreading = true
//! seed = 42
//! ```
//!
//! ## Categories
//!
//! - **Population**: body count and spawn ranges
//! - **Grid**: partitions per axis and out-of-range handling
//! - **Collision**: resolver strategy, contact scale, damage
//! - **Execution**: threading, fixed or measured frame delta, event logging

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// How a moving body looks for something to collide with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionStrategy {
    /// Owner grid cell first, then its eight neighbours
    #[default]
    Grid,
    /// Blocking bodies swept in x order, then every moving body
    Sweep,
    /// Every blocking body, then every moving body
    BruteForce,
}

/// What the grid does with positions outside the spawn square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Map to the nearest edge cell
    #[default]
    Clamp,
    /// Wrap around to the opposite side of the grid
    Wrap,
}

/// # Simulation Configuration
///
/// Recognised options for a run. `spawn_range` is a half-extent: the domain
/// is `[-spawn_range, spawn_range]` on both axes and the walls sit on its
/// edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Total number of bodies; the first half are blocking, the rest moving
    pub population: usize,
    /// Half-extent of the square domain
    pub spawn_range: f32,
    /// Magnitude scale of initial velocities
    pub velocity_range: f32,
    /// Smallest spawn radius
    pub radius_min: f32,
    /// Largest spawn radius
    pub radius_max: f32,
    /// Grid cells per axis
    pub partitions: usize,
    /// Run frames across the worker pool
    pub multithreading: bool,
    /// Worker thread override; defaults to available parallelism minus one
    pub worker_threads: Option<usize>,
    /// RNG seed for reproducible populations
    pub seed: Option<u64>,
    /// Resolver used for every moving body
    pub strategy: CollisionStrategy,
    /// Out-of-range handling for cell lookup
    pub boundary: BoundaryMode,
    /// Health every body starts with
    pub initial_health: i32,
    /// Health lost per collision
    pub damage: i32,
    /// Multiplier on the squared radius sum in the contact test
    pub contact_scale: f32,
    /// Record a collision event per body contact
    pub log_collisions: bool,
    /// Fixed seconds per frame; `None` uses the measured frame time
    pub fixed_delta: Option<f32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: 1000,
            spawn_range: 2000.0,
            velocity_range: 0.05,
            radius_min: 0.5,
            radius_max: 2.0,
            partitions: 20,
            multithreading: true,
            worker_threads: None,
            seed: None,
            strategy: CollisionStrategy::Grid,
            boundary: BoundaryMode::Clamp,
            initial_health: 100,
            damage: 20,
            contact_scale: 100.0,
            log_collisions: true,
            fixed_delta: None,
        }
    }
}

impl Config for SimulationConfig {}

impl SimulationConfig {
    /// Set the population size
    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    /// Set the grid resolution
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the resolver strategy
    pub fn with_strategy(mut self, strategy: CollisionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable the worker pool
    pub fn with_multithreading(mut self, enabled: bool) -> Self {
        self.multithreading = enabled;
        self
    }

    /// Pin the number of worker threads
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = Some(workers);
        self
    }

    /// Fix the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use a fixed frame delta
    pub fn with_fixed_delta(mut self, delta: f32) -> Self {
        self.fixed_delta = Some(delta);
        self
    }

    /// Width of one grid cell
    pub fn cell_size(&self) -> f32 {
        self.spawn_range * 2.0 / self.partitions as f32
    }

    /// Number of worker threads the pool should start
    ///
    /// The calling thread always takes a share of the work, so the default
    /// leaves one hardware thread for it. At least one worker is started.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get().saturating_sub(1))
                    .unwrap_or(7)
            })
            .max(1)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(invalid("population", "must be at least 1"));
        }
        if self.partitions == 0 {
            return Err(invalid("partitions", "must be at least 1"));
        }
        if !(self.spawn_range.is_finite() && self.spawn_range > 0.0) {
            return Err(invalid("spawn_range", format!("must be positive, got {}", self.spawn_range)));
        }
        if !(self.radius_min.is_finite() && self.radius_min > 0.0) {
            return Err(invalid("radius_min", format!("must be positive, got {}", self.radius_min)));
        }
        if !self.radius_max.is_finite() || self.radius_max < self.radius_min {
            return Err(invalid(
                "radius_max",
                format!("must be at least radius_min ({}), got {}", self.radius_min, self.radius_max),
            ));
        }
        if !(self.velocity_range.is_finite() && self.velocity_range >= 0.0) {
            return Err(invalid("velocity_range", "must be zero or positive"));
        }
        if !(self.contact_scale.is_finite() && self.contact_scale >= 0.0) {
            return Err(invalid("contact_scale", "must be zero or positive"));
        }
        if let Some(delta) = self.fixed_delta {
            if !(delta.is_finite() && delta >= 0.0) {
                return Err(invalid("fixed_delta", format!("must be zero or positive, got {delta}")));
            }
        }
        if self.worker_threads == Some(0) {
            return Err(invalid("worker_threads", "must be at least 1 when set"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
