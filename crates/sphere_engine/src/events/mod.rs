//! Collision event log
//!
//! Workers append one [`CollisionEvent`] per detected body contact to a shared
//! [`EventLog`]. Once per frame the log is drained into an [`EventSink`],
//! which owns durable storage. Key principles:
//! - Events are immutable snapshots (names and health at the time of contact)
//! - Appending is the only operation done from worker threads
//! - Draining leaves the buffer empty

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// One body contact as seen by the body that detected it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Name of the detecting body
    pub name_a: String,
    /// Health of the detecting body after damage
    pub health_a: i32,
    /// Name of the body it hit
    pub name_b: String,
    /// Health of the body it hit after damage
    pub health_b: i32,
}

impl CollisionEvent {
    /// Build an event from two name/health snapshots
    pub fn new(
        timestamp: u64,
        (name_a, health_a): (&str, i32),
        (name_b, health_b): (&str, i32),
    ) -> Self {
        Self {
            timestamp,
            name_a: name_a.to_owned(),
            health_a,
            name_b: name_b.to_owned(),
            health_b,
        }
    }
}

impl fmt::Display for CollisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Collision: {}, Health : {} with {}, Health : {}",
            self.timestamp, self.name_a, self.health_a, self.name_b, self.health_b
        )
    }
}

/// Thread-safe in-memory event buffer
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event
    pub fn append(&self, event: CollisionEvent) {
        self.lock().push(event);
    }

    /// Append a batch collected by one worker
    pub fn extend(&self, events: impl IntoIterator<Item = CollisionEvent>) {
        self.lock().extend(events);
    }

    /// Take every buffered event, leaving the log empty
    pub fn drain(&self) -> Vec<CollisionEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Nothing buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CollisionEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Destination for drained events
pub trait EventSink: Send {
    /// Persist a batch of events
    fn write_events(&mut self, events: &[CollisionEvent]) -> io::Result<()>;

    /// Flush anything buffered
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one formatted line per event to any [`Write`]
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: W,
    written: usize,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer
    pub const fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of events written so far
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn write_events(&mut self, events: &[CollisionEvent]) -> io::Result<()> {
        for event in events {
            writeln!(self.writer, "{event}")?;
        }
        self.written += events.len();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn write_events(&mut self, _events: &[CollisionEvent]) -> io::Result<()> {
        Ok(())
    }
}
