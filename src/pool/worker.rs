//! Worker thread implementation

use crate::core::error::panic_message;
use crate::core::{CancellationToken, Orange, PlantError, Result};
use crate::observer::PlantEvent;
use crate::plant::PlantCore;
use crate::queue::RecvError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Oranges driven to the terminal stage
    pub oranges_processed: AtomicU64,
    /// Stage transitions performed
    pub transitions: AtomicU64,
    /// Stage delays cut short by cancellation
    pub interrupted_stages: AtomicU64,
    /// Oranges abandoned after an invalid transition
    pub oranges_failed: AtomicU64,
    /// Oranges abandoned after a panic
    pub oranges_panicked: AtomicU64,
    /// Total time spent processing oranges (microseconds)
    pub busy_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total oranges processed
    pub fn get_oranges_processed(&self) -> u64 {
        self.oranges_processed.load(Ordering::Relaxed)
    }

    /// Get total stage transitions
    pub fn get_transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Get total interrupted stage delays
    pub fn get_interrupted_stages(&self) -> u64 {
        self.interrupted_stages.load(Ordering::Relaxed)
    }

    /// Get total oranges abandoned after an error
    pub fn get_oranges_failed(&self) -> u64 {
        self.oranges_failed.load(Ordering::Relaxed)
    }

    /// Get total oranges abandoned after a panic
    pub fn get_oranges_panicked(&self) -> u64 {
        self.oranges_panicked.load(Ordering::Relaxed)
    }

    /// Get average processing time per orange in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.busy_time_us.load(Ordering::Relaxed);
        let count = self.oranges_processed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// A worker thread that drains the plant's queue
///
/// The worker exits when its take times out while the plant is no longer
/// running and the queue is empty, when the queue is closed and empty, or
/// when its cancellation token fires. It never exits merely because
/// production stopped, so queued oranges are always drained.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    name: Arc<str>,
    thread: Option<thread::JoinHandle<()>>,
    done: Receiver<()>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Create and start a new worker bound to a plant
    pub(crate) fn spawn(id: usize, plant: Arc<PlantCore>, token: CancellationToken) -> Result<Self> {
        let name: Arc<str> = Arc::from(format!(
            "{}-{}-{}",
            plant.name, plant.config.thread_name_prefix, id
        ));
        let stats = Arc::new(WorkerStats::new());
        // Sender lives as long as the thread; disconnection means "exited"
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);

        let ctx = WorkerContext {
            name: Arc::clone(&name),
            plant,
            token,
            stats: Arc::clone(&stats),
        };

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                ctx.run();
            })
            .map_err(|e| PlantError::spawn_with_source(name.to_string(), e))?;

        Ok(Self {
            id,
            name,
            thread: Some(thread),
            done,
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Whether the worker loop has exited
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// Wait until the worker exits or `deadline` passes; true if it exited
    pub fn wait_until(&self, deadline: Instant) -> bool {
        matches!(
            self.done.recv_deadline(deadline),
            Err(RecvTimeoutError::Disconnected) | Ok(())
        )
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|payload| {
                PlantError::join(self.name.to_string(), panic_message(payload.as_ref()))
            })?;
        }
        Ok(())
    }

    /// Give up on a worker that ignored cancellation
    pub(crate) fn detach(mut self) {
        self.thread.take();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

            if !self.wait_until(Instant::now() + JOIN_TIMEOUT) {
                log::warn!(
                    "{} did not finish within {}s during drop; thread may be leaked",
                    self.name,
                    JOIN_TIMEOUT.as_secs()
                );
                return;
            }
            if let Err(payload) = thread.join() {
                log::error!(
                    "{} panicked during shutdown: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// Everything the worker thread owns
struct WorkerContext {
    name: Arc<str>,
    plant: Arc<PlantCore>,
    token: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl WorkerContext {
    /// Main worker loop
    fn run(self) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", name = %self.name);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        #[cfg(feature = "tracing")]
        debug!("worker started");

        let poll_timeout = self.plant.config.poll_timeout();

        loop {
            match self.plant.queue.recv_cancellable(poll_timeout, &self.token) {
                Ok(orange) => self.process(orange),
                Err(RecvError::Empty) => {
                    // Exit only when production is over AND nothing is left;
                    // an orange still being fetched keeps the worker polling
                    if !self.plant.is_running()
                        && !self.plant.is_producing()
                        && self.plant.queue.is_empty()
                    {
                        break;
                    }
                }
                Err(RecvError::Disconnected) => break,
                Err(RecvError::Cancelled) => {
                    log::debug!("{} cancelled while waiting for oranges", self.name);
                    break;
                }
            }
        }

        #[cfg(feature = "tracing")]
        debug!(
            oranges_processed = self.stats.get_oranges_processed(),
            "worker shutting down"
        );

        self.plant.emit(PlantEvent::WorkerStopped {
            plant: Arc::clone(&self.plant.name),
            worker: Arc::clone(&self.name),
            processed: self.stats.get_oranges_processed(),
        });
    }

    /// Drive one orange to the terminal stage with panic protection
    fn process(&self, mut orange: Orange) {
        let start = Instant::now();
        let id = orange.id();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.drive(&mut orange)));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                self.plant.increment_processed();
                self.stats.oranges_processed.fetch_add(1, Ordering::Relaxed);
                self.plant.emit(PlantEvent::OrangeProcessed {
                    plant: Arc::clone(&self.plant.name),
                    worker: Arc::clone(&self.name),
                    orange: id,
                });
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_orange_processed(elapsed);
            }
            Ok(Err(e)) => {
                log::error!("{}: abandoned orange #{}: {}", self.name, id, e);
                self.stats.oranges_failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                log::error!(
                    "{}: panicked on orange #{}: {}",
                    self.name,
                    id,
                    panic_message(payload.as_ref())
                );
                self.stats.oranges_panicked.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.stats
            .busy_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn drive(&self, orange: &mut Orange) -> Result<()> {
        let costs = &self.plant.config.stage_costs;
        while !orange.is_processed() {
            let transition = orange.advance(costs, &self.token)?;
            self.stats.transitions.fetch_add(1, Ordering::Relaxed);

            if transition.interrupted {
                self.stats.interrupted_stages.fetch_add(1, Ordering::Relaxed);
                self.plant.emit(PlantEvent::StageInterrupted {
                    plant: Arc::clone(&self.plant.name),
                    worker: Arc::clone(&self.name),
                    orange: orange.id(),
                    stage: transition.from,
                });
            }

            self.plant.emit(PlantEvent::StageAdvanced {
                plant: Arc::clone(&self.plant.name),
                worker: Arc::clone(&self.name),
                orange: orange.id(),
                stage: transition.to,
            });
        }
        Ok(())
    }
}
