//! A single bottling plant
//!
//! A [`Plant`] owns one work queue, one producer thread and one
//! [`WorkerPool`]. The producer fetches an orange, counts it as supplied and
//! enqueues it; workers drive each orange to [`Stage::Processed`] and count
//! it as processed.
//!
//! The lifecycle is one-way: `Idle → Running → Draining → Stopped`.
//!
//! ```rust
//! use bottling_plant::{Plant, PlantConfig, StageCosts};
//! use std::time::Duration;
//!
//! # fn main() -> bottling_plant::Result<()> {
//! let config = PlantConfig::new(2)
//!     .with_stage_costs(StageCosts::zero())
//!     .with_production_interval(Duration::ZERO)
//!     .with_poll_timeout(Duration::from_millis(20))
//!     .with_supply_limit(9);
//!
//! let plant = Plant::new(1, config)?;
//! plant.start()?;
//! plant.wait_to_stop()?;
//! plant.stop()?;
//!
//! assert_eq!(plant.processed(), 9);
//! assert_eq!(plant.bottles(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! [`Stage::Processed`]: crate::core::Stage::Processed

use crate::config::PlantConfig;
use crate::core::error::panic_message;
use crate::core::{CancellationReason, CancellationToken, Orange, PlantError, Result};
use crate::observer::{LogObserver, PlantEvent, SharedObserver};
use crate::pool::{WorkerPool, WorkerStats};
use crate::queue::WorkQueue;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Lifecycle state of a plant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlantState {
    /// Created, not started
    Idle,
    /// Producer and workers are running
    Running,
    /// Production stopped, queued oranges are being finished
    Draining,
    /// Every thread has exited; terminal
    Stopped,
}

impl fmt::Display for PlantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlantState::Idle => "idle",
            PlantState::Running => "running",
            PlantState::Draining => "draining",
            PlantState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Snapshot of a plant's counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlantStats {
    /// Oranges handed to the queue
    pub supplied: u64,
    /// Oranges driven to the terminal stage
    pub processed: u64,
    /// Oranges needed per bottle
    pub oranges_per_bottle: u64,
}

impl PlantStats {
    /// Create a snapshot
    pub fn new(supplied: u64, processed: u64, oranges_per_bottle: u64) -> Self {
        Self {
            supplied,
            processed,
            oranges_per_bottle,
        }
    }

    /// Full bottles produced
    pub fn bottles(&self) -> u64 {
        self.processed / self.oranges_per_bottle
    }

    /// Processed oranges left over after filling bottles
    pub fn waste(&self) -> u64 {
        self.processed % self.oranges_per_bottle
    }

    /// Supplied oranges not yet processed
    pub fn pending(&self) -> u64 {
        self.supplied.saturating_sub(self.processed)
    }
}

/// What happened during [`Plant::stop`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopReport {
    /// Plant name
    pub plant: Arc<str>,
    /// Workers were force-cancelled after the grace period
    pub forced: bool,
    /// Workers still running when the grace period expired
    pub stuck_workers: usize,
    /// Workers that ignored cancellation too and were left behind
    pub leaked_workers: usize,
    /// Grace period that applied
    pub grace_period: Duration,
    /// Time spent in `stop()`
    pub elapsed: Duration,
    /// Counters after every worker exited
    pub stats: PlantStats,
}

impl StopReport {
    /// Turn a forced shutdown into `PlantError::ShutdownTimeout`
    pub fn ensure_graceful(&self) -> Result<()> {
        if self.forced {
            Err(PlantError::shutdown_timeout(
                self.plant.as_ref(),
                self.grace_period.as_millis() as u64,
                self.stuck_workers,
            ))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    supplied: u64,
    processed: u64,
}

/// State shared between a plant, its producer and its workers
pub(crate) struct PlantCore {
    pub(crate) name: Arc<str>,
    pub(crate) config: PlantConfig,
    pub(crate) queue: WorkQueue<Orange>,
    running: AtomicBool,
    producing: AtomicBool,
    counters: Mutex<Counters>,
    observer: SharedObserver,
}

impl fmt::Debug for PlantCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlantCore")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("producing", &self.is_producing())
            .field("queue", &self.queue)
            .field("counters", &*self.counters.lock())
            .finish()
    }
}

impl PlantCore {
    pub(crate) fn new(name: &str, config: PlantConfig, observer: SharedObserver) -> Self {
        Self {
            name: Arc::from(name),
            queue: WorkQueue::with_capacity(config.queue_capacity),
            config,
            running: AtomicBool::new(false),
            producing: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
            observer,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Whether the producer thread may still enqueue an orange
    pub(crate) fn is_producing(&self) -> bool {
        self.producing.load(Ordering::Acquire)
    }

    pub(crate) fn set_producing(&self, producing: bool) {
        self.producing.store(producing, Ordering::Release);
    }

    /// Count one more supplied orange; returns the new total
    pub(crate) fn record_supplied(&self) -> u64 {
        let mut counters = self.counters.lock();
        counters.supplied += 1;
        counters.supplied
    }

    pub(crate) fn increment_processed(&self) {
        self.counters.lock().processed += 1;
    }

    pub(crate) fn stats(&self) -> PlantStats {
        let counters = self.counters.lock();
        PlantStats::new(
            counters.supplied,
            counters.processed,
            self.config.oranges_per_bottle,
        )
    }

    pub(crate) fn emit(&self, event: PlantEvent) {
        self.observer.on_event(&event);
    }
}

/// A bottling plant: one producer, one queue, a pool of workers
pub struct Plant {
    id: usize,
    core: Arc<PlantCore>,
    state: Mutex<PlantState>,
    producer_token: CancellationToken,
    producer: Mutex<Option<JoinHandle<()>>>,
    producer_done: Mutex<Option<Receiver<()>>>,
    pool: Mutex<Option<WorkerPool>>,
    worker_stats: Mutex<Vec<Arc<WorkerStats>>>,
}

impl fmt::Debug for Plant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plant")
            .field("name", &self.core.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Plant {
    /// Create an idle plant that reports through [`LogObserver`]
    pub fn new(id: usize, config: PlantConfig) -> Result<Self> {
        Self::with_observer(id, config, Arc::new(LogObserver))
    }

    /// Create an idle plant with a custom observer
    pub fn with_observer(id: usize, config: PlantConfig, observer: SharedObserver) -> Result<Self> {
        config.validate()?;
        let name = format!("Plant[{}]", id);

        Ok(Self {
            id,
            core: Arc::new(PlantCore::new(&name, config, observer)),
            state: Mutex::new(PlantState::Idle),
            producer_token: CancellationToken::new(),
            producer: Mutex::new(None),
            producer_done: Mutex::new(None),
            pool: Mutex::new(None),
            worker_stats: Mutex::new(Vec::new()),
        })
    }

    /// Start the workers and the producer; returns immediately
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the plant is idle, `SpawnError` if a thread
    /// could not be created (the plant is then stopped).
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != PlantState::Idle {
            return Err(PlantError::invalid_state(
                self.core.name.as_ref(),
                *state,
                "start",
            ));
        }

        self.core.set_running(true);
        self.core.set_producing(true);

        let pool = match WorkerPool::spawn(&self.core) {
            Ok(pool) => pool,
            Err(e) => {
                self.core.set_running(false);
                self.core.set_producing(false);
                *state = PlantState::Stopped;
                return Err(e);
            }
        };
        *self.worker_stats.lock() = pool.stats();
        let workers = pool.size();

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        // Held back until PlantStarted has been emitted
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(1);
        let core = Arc::clone(&self.core);
        let token = self.producer_token.clone();
        let thread_name = format!("{}-producer", self.core.name);

        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let _done = done_tx;
                if go_rx.recv().is_ok() {
                    produce(&core, &token);
                }
                // Cleared only after the final send
                core.set_producing(false);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.core.set_running(false);
                self.core.set_producing(false);
                self.core.queue.close();
                pool.shutdown(self.core.config.grace_period());
                *state = PlantState::Stopped;
                return Err(PlantError::spawn_with_source(thread_name, e));
            }
        };

        *self.producer.lock() = Some(handle);
        *self.producer_done.lock() = Some(done_rx);
        *self.pool.lock() = Some(pool);
        *state = PlantState::Running;

        self.core.emit(PlantEvent::PlantStarted {
            plant: Arc::clone(&self.core.name),
            workers,
        });
        let _ = go_tx.send(());
        Ok(())
    }

    /// Stop production, finish every queued orange, then stop the workers
    ///
    /// Blocks until the queue is empty and every worker has exited, or the
    /// grace period forced the stragglers to be cancelled.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the plant is running.
    pub fn stop(&self) -> Result<StopReport> {
        {
            let mut state = self.state.lock();
            if *state != PlantState::Running {
                return Err(PlantError::invalid_state(
                    self.core.name.as_ref(),
                    *state,
                    "stop",
                ));
            }
            *state = PlantState::Draining;
        }

        let start = Instant::now();
        log::debug!("{} stopping production", self.core.name);

        self.core.set_running(false);
        self.producer_token
            .cancel_with_reason(CancellationReason::Shutdown);

        // No orange can be enqueued once the producer loop has exited
        let done = self.producer_done.lock().take();
        if let Some(done) = done {
            let _ = done.recv();
        }

        let pool = self.pool.lock().take();
        let interval = self.core.config.drain_check_interval();
        while !self.core.queue.wait_until_empty_for(interval) {
            let live = pool.as_ref().map_or(0, WorkerPool::live_workers);
            if live == 0 {
                log::warn!(
                    "{}: no workers left, abandoning {} queued oranges",
                    self.core.name,
                    self.core.queue.len()
                );
                break;
            }
        }

        log::debug!("{} queue drained, stopping workers", self.core.name);
        self.core.queue.close();

        let grace = self.core.config.grace_period();
        let shutdown = pool.map(|p| p.shutdown(grace)).unwrap_or_default();
        if shutdown.forced {
            log::warn!(
                "{}",
                PlantError::shutdown_timeout(
                    self.core.name.as_ref(),
                    grace.as_millis() as u64,
                    shutdown.stuck_workers
                )
            );
        }

        let stats = self.core.stats();
        *self.state.lock() = PlantState::Stopped;

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_plant_stop(&self.core.name, stats.supplied, stats.processed);

        self.core.emit(PlantEvent::PlantStopped {
            plant: Arc::clone(&self.core.name),
            stats,
        });

        Ok(StopReport {
            plant: Arc::clone(&self.core.name),
            forced: shutdown.forced,
            stuck_workers: shutdown.stuck_workers,
            leaked_workers: shutdown.leaked,
            grace_period: grace,
            elapsed: start.elapsed(),
            stats,
        })
    }

    /// Join the producer thread
    ///
    /// Returns once the producer has exited: after `stop()`, or on its own
    /// when a supply limit is configured. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the plant was never started, `JoinError` if the
    /// producer panicked.
    pub fn wait_to_stop(&self) -> Result<()> {
        if self.state() == PlantState::Idle {
            return Err(PlantError::invalid_state(
                self.core.name.as_ref(),
                PlantState::Idle,
                "wait to stop",
            ));
        }

        let handle = self.producer.lock().take();
        if let Some(handle) = handle {
            handle.join().map_err(|payload| {
                let message = panic_message(payload.as_ref());
                log::error!("{} producer panicked: {}", self.core.name, message);
                PlantError::join(format!("{}-producer", self.core.name), message)
            })?;
        }
        Ok(())
    }

    /// Plant number
    pub fn id(&self) -> usize {
        self.id
    }

    /// Plant name, `Plant[id]`
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlantState {
        *self.state.lock()
    }

    /// Whether the producer is still supposed to run
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Oranges waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.core.queue.len()
    }

    /// Plant configuration
    pub fn config(&self) -> &PlantConfig {
        &self.core.config
    }

    /// Consistent snapshot of both counters
    pub fn stats(&self) -> PlantStats {
        self.core.stats()
    }

    /// Oranges supplied so far
    pub fn supplied(&self) -> u64 {
        self.stats().supplied
    }

    /// Oranges processed so far
    pub fn processed(&self) -> u64 {
        self.stats().processed
    }

    /// Bottles filled so far
    pub fn bottles(&self) -> u64 {
        self.stats().bottles()
    }

    /// Processed oranges not making up a full bottle
    pub fn waste(&self) -> u64 {
        self.stats().waste()
    }

    /// Per-worker statistics (empty until started)
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.lock().clone()
    }
}

impl Drop for Plant {
    fn drop(&mut self) {
        if self.state() == PlantState::Running {
            if let Err(e) = self.stop() {
                log::error!("Failed to stop {} during drop: {}", self.core.name, e);
            }
        }
        if let Err(e) = self.wait_to_stop() {
            if !matches!(e, PlantError::InvalidState { .. }) {
                log::error!("{}", e);
            }
        }
    }
}

/// Producer loop: one orange per tick until production stops
fn produce(core: &PlantCore, token: &CancellationToken) {
    #[cfg(feature = "tracing")]
    let producer_span = span!(Level::DEBUG, "producer", plant = %core.name);
    #[cfg(feature = "tracing")]
    let _guard = producer_span.enter();

    // Fetching always completes; only the pause between oranges is cut short
    let fetch_token = CancellationToken::new();
    let interval = core.config.production_interval();
    let mut next_id = 1u64;

    while core.is_running() {
        if matches!(core.config.supply_limit, Some(limit) if next_id > limit) {
            log::debug!("{} reached its supply limit", core.name);
            break;
        }

        let orange = Orange::fetch(next_id, &core.config.stage_costs, &fetch_token);
        let supplied = core.record_supplied();

        if let Err(e) = core.queue.send(orange) {
            log::error!(
                "{}: orange #{} lost: {}",
                core.name,
                e.into_inner().id(),
                PlantError::QueueClosed
            );
            break;
        }

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_orange_supplied(core.queue.len());

        core.emit(PlantEvent::OrangeSupplied {
            plant: Arc::clone(&core.name),
            orange: next_id,
            supplied,
        });
        next_id += 1;

        if token.sleep(interval).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageCosts;
    use crate::observer::NoopObserver;

    fn fast_config(workers: usize) -> PlantConfig {
        PlantConfig::new(workers)
            .with_stage_costs(StageCosts::zero())
            .with_production_interval(Duration::from_millis(1))
            .with_poll_timeout(Duration::from_millis(20))
            .with_drain_check_interval(Duration::from_millis(10))
    }

    fn quiet_plant(config: PlantConfig) -> Plant {
        Plant::with_observer(1, config, Arc::new(NoopObserver)).expect("valid config")
    }

    #[test]
    fn test_stats_arithmetic() {
        let stats = PlantStats::new(12, 10, 3);
        assert_eq!(stats.bottles(), 3);
        assert_eq!(stats.waste(), 1);
        assert_eq!(stats.pending(), 2);
    }

    #[test]
    fn test_new_plant_is_idle() {
        let plant = quiet_plant(fast_config(2));
        assert_eq!(plant.id(), 1);
        assert_eq!(plant.name(), "Plant[1]");
        assert_eq!(plant.state(), PlantState::Idle);
        assert!(!plant.is_running());
        assert_eq!(plant.stats(), PlantStats::new(0, 0, 3));
        assert!(plant.worker_stats().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Plant::new(1, PlantConfig::new(0));
        assert!(matches!(result, Err(PlantError::InvalidConfig { .. })));
    }

    #[test]
    fn test_start_stop_cycle() {
        let plant = quiet_plant(fast_config(2));
        plant.start().expect("start failed");
        assert_eq!(plant.state(), PlantState::Running);
        assert!(plant.is_running());
        assert_eq!(plant.worker_stats().len(), 2);

        thread::sleep(Duration::from_millis(50));

        let report = plant.stop().expect("stop failed");
        assert_eq!(plant.state(), PlantState::Stopped);
        assert!(!report.forced);
        assert!(report.ensure_graceful().is_ok());
        assert!(report.stats.supplied > 0);
        assert_eq!(report.stats.processed, report.stats.supplied);
        assert_eq!(plant.queue_len(), 0);

        plant.wait_to_stop().expect("wait_to_stop failed");
    }

    #[test]
    fn test_lifecycle_is_one_way() {
        let plant = quiet_plant(fast_config(1));
        assert!(matches!(plant.stop(), Err(PlantError::InvalidState { .. })));
        assert!(matches!(
            plant.wait_to_stop(),
            Err(PlantError::InvalidState { .. })
        ));

        plant.start().unwrap();
        assert!(matches!(plant.start(), Err(PlantError::InvalidState { .. })));

        plant.stop().unwrap();
        assert!(matches!(plant.stop(), Err(PlantError::InvalidState { .. })));
        assert!(matches!(plant.start(), Err(PlantError::InvalidState { .. })));
    }

    #[test]
    fn test_supply_limit_stops_producer() {
        let plant = quiet_plant(fast_config(2).with_supply_limit(7));
        plant.start().unwrap();
        plant.wait_to_stop().unwrap();

        // Producer is gone but the plant is still running until stopped
        assert_eq!(plant.supplied(), 7);
        assert_eq!(plant.state(), PlantState::Running);

        let report = plant.stop().unwrap();
        assert_eq!(report.stats, PlantStats::new(7, 7, 3));
        assert_eq!(plant.bottles(), 2);
        assert_eq!(plant.waste(), 1);
    }

    #[test]
    fn test_report_forced_shutdown_error() {
        let report = StopReport {
            plant: Arc::from("Plant[9]"),
            forced: true,
            stuck_workers: 2,
            leaked_workers: 0,
            grace_period: Duration::from_millis(2000),
            elapsed: Duration::from_millis(2100),
            stats: PlantStats::new(5, 5, 3),
        };
        let err = report.ensure_graceful().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Plant 'Plant[9]' workers did not stop within 2000ms (2 still running)"
        );
    }

    #[test]
    fn test_drop_stops_running_plant() {
        let plant = quiet_plant(fast_config(2));
        plant.start().unwrap();
        let stats = plant.worker_stats();
        thread::sleep(Duration::from_millis(30));
        drop(plant);

        // Workers exited, so nothing holds their stats but us
        for s in stats {
            assert_eq!(Arc::strong_count(&s), 1);
        }
    }
}
