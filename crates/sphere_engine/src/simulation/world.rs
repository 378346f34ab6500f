//! Simulation world and frame update
//!
//! A frame runs in four phases separated by barriers:
//!
//! 1. **Step**: every moving body is resolved against the start-of-frame
//!    state and its new position and velocity computed. Chunks of bodies run
//!    on the worker pool; nothing but health and the event log is written.
//! 2. **Apply**: the computed outcomes are written into the body registry.
//! 3. **Relocate**: bodies whose cell changed move to their new cell,
//!    chunked over the pool the same way, under per-cell locks.
//! 4. **Settle**: touched cells are put back into canonical order.
//!
//! Because no body reads another body's new state within a frame, and
//! cells are re-sorted before the next one, single- and multi-threaded runs
//! produce the same result.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace};
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

use crate::bodies::{BodyKind, BodyRef, BodyRegistry};
use crate::core::{ConfigError, SimulationConfig};
use crate::events::{CollisionEvent, EventLog};
use crate::foundation::time::{unix_timestamp, Stopwatch};
use crate::physics::{resolver_for, step_range, ChunkOutcome, CollisionResolver, ContactRule, ResolveContext, StepParams};
use crate::scheduler::{ChunkPlan, Job, SchedulerError, WorkerPool};
use crate::spatial::{GridError, GridLayout, SweepIndex, UniformGrid};

use super::spawn::spawn_population;

/// Errors raised while building or stepping a world
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A frame could not complete on the worker pool
    #[error("frame aborted: {0}")]
    Scheduler(#[from] SchedulerError),
    /// A job still held the world after the barrier
    #[error("world state is still shared after the frame barrier")]
    StateShared,
    /// Grid membership does not match the bodies
    #[error("grid out of sync with bodies: {0}")]
    Grid(#[from] GridError),
}

/// Summary of one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Seconds simulated
    pub dt: f32,
    /// Wall bounces
    pub wall_contacts: usize,
    /// Body contacts
    pub body_contacts: usize,
    /// Bodies that changed cell
    pub relocated: usize,
    /// Time spent in the frame
    pub work_time: Duration,
    /// Whether the pool was used
    pub multithreaded: bool,
}

enum PhaseResult {
    Step(ChunkOutcome),
    Relocated(usize),
}

/// Everything the workers read during a frame
#[derive(Debug)]
pub struct WorldState {
    registry: BodyRegistry,
    grid: UniformGrid,
    sweep: SweepIndex,
    events: EventLog,
    rule: ContactRule,
    resolver: &'static dyn CollisionResolver,
}

impl WorldState {
    fn new(config: &SimulationConfig, registry: BodyRegistry, resolver: &'static dyn CollisionResolver) -> Self {
        let layout = GridLayout::new(config.partitions, config.spawn_range, config.boundary);
        Self {
            grid: UniformGrid::populated(layout, &registry),
            sweep: SweepIndex::build(&registry),
            events: EventLog::new(),
            rule: ContactRule::new(config.spawn_range, config.contact_scale),
            resolver,
            registry,
        }
    }

    /// Bodies
    pub const fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    /// Grid membership
    pub const fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    /// Pending collision events
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Read-only view for the resolver
    pub fn context(&self) -> ResolveContext<'_> {
        ResolveContext {
            registry: &self.registry,
            grid: &self.grid,
            sweep: &self.sweep,
            rule: self.rule,
        }
    }

    fn step_range(&self, range: Range<usize>, params: &StepParams) -> ChunkOutcome {
        step_range(
            &self.context(),
            self.resolver,
            range,
            params,
            Some(&self.events),
        )
    }

    fn relocate_range(&self, range: Range<usize>) -> usize {
        let moving = self.registry.moving();
        range
            .filter(|&slot| self.grid.relocate(BodyRef::moving(slot), &moving[slot].position))
            .count()
    }
}

/// A running simulation
///
/// Owns the bodies, the grid, the event log and the worker pool.
#[derive(Debug)]
pub struct SimulationWorld {
    config: SimulationConfig,
    state: Arc<WorldState>,
    pool: Option<WorkerPool<PhaseResult>>,
    multithreading: bool,
    frame: u64,
}

impl std::fmt::Debug for PhaseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(chunk) => write!(f, "Step({} bodies)", chunk.outcomes.len()),
            Self::Relocated(count) => write!(f, "Relocated({count})"),
        }
    }
}

impl SimulationWorld {
    /// Randomly populated world
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        WorldBuilder::new(config).build()
    }

    /// Configuration the world was built with
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Frozen world data
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Bodies
    pub fn registry(&self) -> &BodyRegistry {
        &self.state.registry
    }

    /// Grid membership
    pub fn grid(&self) -> &UniformGrid {
        &self.state.grid
    }

    /// Pending collision events
    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// Take every pending collision event
    pub fn drain_events(&self) -> Vec<CollisionEvent> {
        self.state.events.drain()
    }

    /// Frames stepped so far
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Frames currently run on the worker pool
    pub const fn is_multithreaded(&self) -> bool {
        self.multithreading
    }

    /// Worker threads available, zero when the pool is not running
    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::size)
    }

    /// Switch between pooled and single-threaded frames
    ///
    /// The pool is started on first use and kept when switching off.
    pub fn set_multithreading(&mut self, enabled: bool) -> Result<(), SimulationError> {
        if enabled && self.pool.is_none() {
            self.pool = Some(WorkerPool::new(self.config.resolved_worker_threads())?);
        }
        if enabled != self.multithreading {
            info!("Multithreading {}", if enabled { "enabled" } else { "disabled" });
        }
        self.multithreading = enabled;
        Ok(())
    }

    /// Check that every body sits in the cell its position maps to
    pub fn verify(&self) -> Result<(), SimulationError> {
        self.state.grid.verify(&self.state.registry)?;
        Ok(())
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f32) -> Result<FrameReport, SimulationError> {
        let stopwatch = Stopwatch::start_new();
        let params = StepParams {
            dt,
            damage: self.config.damage,
            log_events: self.config.log_collisions,
            timestamp: unix_timestamp(),
        };
        let moving = self.state.registry.len_of(BodyKind::Moving);
        let pool = self.pool.as_ref().filter(|_| self.multithreading);

        // Step
        let chunks: Vec<ChunkOutcome> = match pool {
            Some(pool) => {
                let plan = ChunkPlan::new(moving, pool.size());
                let jobs = plan
                    .worker_ranges()
                    .filter(|range| !range.is_empty())
                    .map(|range| {
                        let state = Arc::clone(&self.state);
                        Box::new(move || PhaseResult::Step(state.step_range(range, &params))) as Job<PhaseResult>
                    })
                    .collect();
                pool.execute(jobs, || PhaseResult::Step(self.state.step_range(plan.caller_range(), &params)))?
                    .into_iter()
                    .filter_map(|part| match part {
                        PhaseResult::Step(chunk) => Some(chunk),
                        PhaseResult::Relocated(_) => None,
                    })
                    .collect()
            }
            None => vec![self.state.step_range(0..moving, &params)],
        };

        // Apply
        let state = Arc::get_mut(&mut self.state).ok_or(SimulationError::StateShared)?;
        let bodies = state.registry.moving_mut();
        let mut report = FrameReport {
            frame: self.frame + 1,
            dt,
            multithreaded: pool.is_some(),
            ..FrameReport::default()
        };
        for chunk in &chunks {
            report.wall_contacts += chunk.wall_contacts;
            report.body_contacts += chunk.body_contacts;
            for outcome in &chunk.outcomes {
                let body = &mut bodies[outcome.slot];
                body.position = outcome.position;
                body.velocity = outcome.velocity;
            }
        }

        // Relocate
        report.relocated = match pool {
            Some(pool) => {
                let plan = ChunkPlan::new(moving, pool.size());
                let jobs = plan
                    .worker_ranges()
                    .filter(|range| !range.is_empty())
                    .map(|range| {
                        let state = Arc::clone(&self.state);
                        Box::new(move || PhaseResult::Relocated(state.relocate_range(range))) as Job<PhaseResult>
                    })
                    .collect();
                pool.execute(jobs, || PhaseResult::Relocated(self.state.relocate_range(plan.caller_range())))?
                    .into_iter()
                    .map(|part| match part {
                        PhaseResult::Relocated(count) => count,
                        PhaseResult::Step(_) => 0,
                    })
                    .sum()
            }
            None => self.state.relocate_range(0..moving),
        };

        // Settle
        let state = Arc::get_mut(&mut self.state).ok_or(SimulationError::StateShared)?;
        state.grid.settle();

        self.frame += 1;
        report.work_time = stopwatch.elapsed();
        trace!(
            "Frame {}: {} body contacts, {} wall contacts, {} relocated",
            report.frame,
            report.body_contacts,
            report.wall_contacts,
            report.relocated
        );
        Ok(report)
    }

    /// Stop and join the worker pool
    ///
    /// Frames after a shutdown run single-threaded until multithreading is
    /// enabled again.
    pub fn shutdown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
            debug!("Simulation world released its worker pool");
        }
        self.multithreading = false;
    }
}

/// Builds a [`SimulationWorld`] from a config and optionally explicit bodies
#[derive(Debug, Clone)]
pub struct WorldBuilder {
    config: SimulationConfig,
    registry: Option<BodyRegistry>,
    resolver: Option<&'static dyn CollisionResolver>,
}

impl WorldBuilder {
    /// Random population drawn from `config`
    pub const fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            registry: None,
            resolver: None,
        }
    }

    /// Use these bodies instead of a random population
    pub fn with_registry(mut self, registry: BodyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Search for contacts with `resolver` instead of the configured strategy
    pub fn with_resolver(mut self, resolver: &'static dyn CollisionResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Validate, populate, index and start the pool
    pub fn build(self) -> Result<SimulationWorld, SimulationError> {
        let Self {
            mut config,
            registry,
            resolver,
        } = self;
        if let Some(registry) = &registry {
            config.population = registry.len();
        }
        config.validate()?;

        let registry = registry.unwrap_or_else(|| {
            let mut rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
            spawn_population(&config, &mut rng)
        });
        let resolver = resolver.unwrap_or_else(|| resolver_for(config.strategy));
        let state = WorldState::new(&config, registry, resolver);

        info!(
            "Simulation world: {} moving, {} blocking, {}x{} cells of {:.1}, {} resolver",
            state.registry.len_of(BodyKind::Moving),
            state.registry.len_of(BodyKind::Blocking),
            config.partitions,
            config.partitions,
            config.cell_size(),
            resolver.name(),
        );

        let mut world = SimulationWorld {
            state: Arc::new(state),
            pool: None,
            multithreading: false,
            frame: 0,
            config,
        };
        world.set_multithreading(world.config.multithreading)?;
        Ok(world)
    }
}
