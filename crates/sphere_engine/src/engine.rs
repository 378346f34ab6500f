//! Core engine implementation
//!
//! Drives a [`SimulationWorld`] frame by frame, flushes collision events to an
//! [`EventSink`] after every frame, and keeps running totals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;

use crate::core::{ConfigError, SimulationConfig};
use crate::events::{EventSink, NullSink};
use crate::foundation::time::FrameTimer;
use crate::simulation::{FrameReport, SimulationError, SimulationWorld};

const SUMMARY_INTERVAL: u64 = 100;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// World construction or a frame failed
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    /// The event sink could not be written
    #[error("event sink error: {0}")]
    Sink(#[from] std::io::Error),
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Requests the engine loop to stop after the current frame
///
/// Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the loop to stop
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Has a stop been requested
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Running totals over every frame the engine has stepped
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Frames stepped
    pub frames: u64,
    /// Work time of the latest frame
    pub last_work_time: Duration,
    /// Work time over all frames
    pub total_work_time: Duration,
    /// Body contacts over all frames
    pub body_contacts: usize,
    /// Wall bounces over all frames
    pub wall_contacts: usize,
    /// Events handed to the sink
    pub events_written: usize,
    /// Frames per second of wall-clock time
    pub average_fps: f32,
}

impl FrameStats {
    fn record(&mut self, report: &FrameReport, events: usize) {
        self.frames += 1;
        self.last_work_time = report.work_time;
        self.total_work_time += report.work_time;
        self.body_contacts += report.body_contacts;
        self.wall_contacts += report.wall_contacts;
        self.events_written += events;
    }
}

/// Main engine struct
///
/// Owns the world and the event sink and runs the frame loop.
pub struct Engine {
    world: SimulationWorld,
    sink: Box<dyn EventSink>,
    timer: FrameTimer,
    stop: StopHandle,
    stats: FrameStats,
}

impl Engine {
    /// Build a world from `config`; events are discarded until a sink is set
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        Ok(Self::from_world(SimulationWorld::new(config)?))
    }

    /// Wrap an existing world
    pub fn from_world(world: SimulationWorld) -> Self {
        Self {
            world,
            sink: Box::new(NullSink),
            timer: FrameTimer::new(),
            stop: StopHandle::default(),
            stats: FrameStats::default(),
        }
    }

    /// Send drained events to `sink`
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Handle that stops [`Engine::run`] from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The simulation
    pub const fn world(&self) -> &SimulationWorld {
        &self.world
    }

    /// The simulation, mutably (e.g. to toggle multithreading)
    pub fn world_mut(&mut self) -> &mut SimulationWorld {
        &mut self.world
    }

    /// Totals so far
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Step one frame and flush its events
    ///
    /// The frame delta is the configured fixed delta, or the wall-clock time
    /// since the previous frame.
    pub fn frame(&mut self) -> Result<FrameReport, EngineError> {
        let measured = self.timer.tick();
        let dt = self.world.config().fixed_delta.unwrap_or(measured);
        let report = self.world.step(dt)?;
        let written = self.flush_events()?;
        self.stats.record(&report, written);
        self.stats.average_fps = self.timer.average_fps();

        if report.frame % SUMMARY_INTERVAL == 0 {
            debug!(
                "Frame {}: work {:.3} ms, {} body contacts, {} wall contacts, {:.1} fps",
                report.frame,
                report.work_time.as_secs_f64() * 1000.0,
                report.body_contacts,
                report.wall_contacts,
                self.stats.average_fps
            );
        }
        Ok(report)
    }

    /// Run frames until `max_frames` have run or a stop is requested
    ///
    /// `None` runs until stopped. A stop requested before the call is
    /// honoured before the first frame; the request is consumed when the
    /// loop ends. The worker pool is shut down and pending events are
    /// flushed before returning, also on error.
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<FrameStats, EngineError> {
        info!("Starting simulation loop");
        let mut stepped = 0;
        while !self.stop.is_stop_requested() && max_frames.map_or(true, |max| stepped < max) {
            if let Err(e) = self.frame() {
                error!("Frame failed, stopping: {e}");
                if let Err(flush_error) = self.shutdown() {
                    error!("Shutdown after failed frame also failed: {flush_error}");
                }
                self.stop.reset();
                return Err(e);
            }
            stepped += 1;
        }
        self.stop.reset();
        self.shutdown()?;
        info!(
            "Simulation stopped after {} frames, {} events written",
            self.stats.frames, self.stats.events_written
        );
        Ok(self.stats)
    }

    /// Flush pending events and join the worker pool
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        let written = self.flush_events()?;
        self.stats.events_written += written;
        self.sink.flush()?;
        self.world.shutdown();
        Ok(())
    }

    fn flush_events(&mut self) -> Result<usize, EngineError> {
        let events = self.world.drain_events();
        if events.is_empty() {
            return Ok(0);
        }
        self.sink.write_events(&events).map_err(|e| {
            error!("Failed to write {} collision events: {e}", events.len());
            EngineError::Sink(e)
        })?;
        Ok(events.len())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("world", &self.world)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
