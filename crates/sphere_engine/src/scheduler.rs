//! Worker pool and work splitting
//!
//! A fixed set of long-lived threads, each parked on its own condition
//! variable between frames. The calling thread hands one job to each worker
//! it needs, runs its own share, then waits on every worker it used before
//! returning. Nothing is queued and nothing is stolen: one job per worker per
//! call, and the call is a barrier.
//!
//! Every wait re-checks its predicate, so spurious wakeups are harmless. A
//! panicking job is caught on the worker and reported as an error after the
//! barrier; the worker stays usable.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use thiserror::Error;

/// Unit of work handed to one worker
pub type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Scheduling errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job panicked on a worker thread
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Worker index
        worker: usize,
        /// Panic payload, if it was a string
        message: String,
    },
    /// The calling thread's share panicked
    #[error("calling thread panicked during its share of the work: {message}")]
    CallerPanicked {
        /// Panic payload, if it was a string
        message: String,
    },
    /// The worker has shut down and can take no more work
    #[error("worker {worker} is no longer running")]
    WorkerGone {
        /// Worker index
        worker: usize,
    },
    /// More jobs than workers
    #[error("{jobs} jobs submitted to a pool of {workers} workers")]
    TooManyJobs {
        /// Jobs submitted
        jobs: usize,
        /// Workers available
        workers: usize,
    },
    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Contiguous split of `total` items over `workers` threads plus the caller
///
/// Each worker gets `total / (workers + 1)` items; the caller takes whatever
/// is left, so every item lands in exactly one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    workers: usize,
    chunk: usize,
}

impl ChunkPlan {
    /// Plan for `total` items
    pub const fn new(total: usize, workers: usize) -> Self {
        Self {
            total,
            workers,
            chunk: total / (workers + 1),
        }
    }

    /// Items per worker
    pub const fn chunk_size(&self) -> usize {
        self.chunk
    }

    /// Range of worker `index`
    pub const fn worker_range(&self, index: usize) -> Range<usize> {
        index * self.chunk..(index + 1) * self.chunk
    }

    /// Ranges of every worker, in worker order
    pub fn worker_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.workers).map(move |index| self.worker_range(index))
    }

    /// Range the calling thread runs
    pub const fn caller_range(&self) -> Range<usize> {
        self.workers * self.chunk..self.total
    }
}

enum SlotState<T> {
    Idle,
    Assigned(Job<T>),
    Done(thread::Result<T>),
}

struct WorkSlot<T> {
    state: SlotState<T>,
    shutdown: bool,
}

struct Shared<T> {
    slot: Mutex<WorkSlot<T>>,
    signal: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, WorkSlot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker<T> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<()>>,
}

/// Fixed pool of parked worker threads
pub struct WorkerPool<T: Send + 'static> {
    workers: Vec<Worker<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start `size` worker threads
    pub fn new(size: usize) -> Result<Self, SchedulerError> {
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let shared = Arc::new(Shared {
                slot: Mutex::new(WorkSlot {
                    state: SlotState::Idle,
                    shutdown: false,
                }),
                signal: Condvar::new(),
            });
            let thread = thread::Builder::new()
                .name(format!("sphere-worker-{index}"))
                .spawn({
                    let shared = Arc::clone(&shared);
                    move || worker_loop(&shared)
                })?;
            workers.push(Worker {
                shared,
                thread: Some(thread),
            });
        }
        info!("Worker pool started with {size} threads");
        Ok(Self { workers })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run `jobs` on the workers and `local` on the calling thread
    ///
    /// Job `i` goes to worker `i`. Returns once every dispatched job has
    /// finished, with the job results in order followed by the local result.
    pub fn execute(&self, jobs: Vec<Job<T>>, local: impl FnOnce() -> T) -> Result<Vec<T>, SchedulerError> {
        if jobs.len() > self.workers.len() {
            return Err(SchedulerError::TooManyJobs {
                jobs: jobs.len(),
                workers: self.workers.len(),
            });
        }
        if let Some(worker) = self.workers.iter().take(jobs.len()).position(|w| w.thread.is_none()) {
            return Err(SchedulerError::WorkerGone { worker });
        }

        let dispatched = jobs.len();
        for (worker, job) in self.workers.iter().zip(jobs) {
            let mut slot = worker.shared.lock();
            slot.state = SlotState::Assigned(job);
            worker.shared.signal.notify_all();
        }

        let local = panic::catch_unwind(AssertUnwindSafe(local));

        let mut results = Vec::with_capacity(dispatched + 1);
        let mut failure = None;
        for (index, worker) in self.workers.iter().take(dispatched).enumerate() {
            let mut slot = worker
                .shared
                .signal
                .wait_while(worker.shared.lock(), |slot| !matches!(slot.state, SlotState::Done(_)))
                .unwrap_or_else(PoisonError::into_inner);
            let SlotState::Done(outcome) = std::mem::replace(&mut slot.state, SlotState::Idle) else {
                continue;
            };
            match outcome {
                Ok(value) => results.push(value),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Worker {index} panicked: {message}");
                    failure.get_or_insert(SchedulerError::WorkerPanicked { worker: index, message });
                }
            }
        }

        match local {
            Ok(value) => results.push(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Calling thread panicked during its share: {message}");
                failure.get_or_insert(SchedulerError::CallerPanicked { message });
            }
        }

        failure.map_or(Ok(results), Err)
    }

    /// Stop and join every worker
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        let mut joined = 0;
        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            worker.shared.lock().shutdown = true;
            worker.shared.signal.notify_all();
            if thread.join().is_err() {
                error!("Worker thread exited abnormally");
            }
            joined += 1;
        }
        if joined > 0 {
            debug!("Worker pool stopped, joined {joined} threads");
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + 'static> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.workers.len()).finish()
    }
}

fn worker_loop<T>(shared: &Shared<T>) {
    loop {
        let job = {
            let mut slot = shared
                .signal
                .wait_while(shared.lock(), |slot| {
                    !slot.shutdown && !matches!(slot.state, SlotState::Assigned(_))
                })
                .unwrap_or_else(PoisonError::into_inner);
            if slot.shutdown {
                return;
            }
            match std::mem::replace(&mut slot.state, SlotState::Idle) {
                SlotState::Assigned(job) => job,
                other => {
                    slot.state = other;
                    continue;
                }
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(job));

        shared.lock().state = SlotState::Done(outcome);
        shared.signal.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
