//! Progress notifications emitted by plants and workers
//!
//! The core never prints. Every observable step (a plant tick, a stage
//! transition, a worker exiting) is sent as a [`PlantEvent`] to the
//! [`PlantObserver`] the plant was built with. [`LogObserver`] forwards
//! them to the `log` facade and is the default.

use crate::core::Stage;
use crate::plant::PlantStats;
use std::sync::Arc;

/// Something observable that happened inside a plant
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlantEvent {
    /// Producer and workers were launched
    PlantStarted {
        /// Plant name
        plant: Arc<str>,
        /// Size of the worker pool
        workers: usize,
    },
    /// The producer enqueued an orange (one plant tick)
    OrangeSupplied {
        /// Plant name
        plant: Arc<str>,
        /// Orange id
        orange: u64,
        /// Supplied count after this orange
        supplied: u64,
    },
    /// A worker moved an orange to a new stage
    StageAdvanced {
        /// Plant name
        plant: Arc<str>,
        /// Worker name
        worker: Arc<str>,
        /// Orange id
        orange: u64,
        /// Stage reached
        stage: Stage,
    },
    /// A stage delay was cut short; the transition still happened
    StageInterrupted {
        /// Plant name
        plant: Arc<str>,
        /// Worker name
        worker: Arc<str>,
        /// Orange id
        orange: u64,
        /// Stage whose work was incomplete
        stage: Stage,
    },
    /// An orange reached the terminal stage and was counted
    OrangeProcessed {
        /// Plant name
        plant: Arc<str>,
        /// Worker name
        worker: Arc<str>,
        /// Orange id
        orange: u64,
    },
    /// A worker left its loop
    WorkerStopped {
        /// Plant name
        plant: Arc<str>,
        /// Worker name
        worker: Arc<str>,
        /// Oranges this worker processed
        processed: u64,
    },
    /// Workers outlived the grace period and are being force-cancelled
    ShutdownTimedOut {
        /// Plant name
        plant: Arc<str>,
        /// Workers still running at the deadline
        stuck_workers: usize,
    },
    /// The plant finished stopping
    PlantStopped {
        /// Plant name
        plant: Arc<str>,
        /// Final statistics
        stats: PlantStats,
    },
}

/// Receiver of plant progress events
///
/// Called from producer and worker threads, so implementations must be
/// cheap and thread-safe.
pub trait PlantObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &PlantEvent);
}

impl<F> PlantObserver for F
where
    F: Fn(&PlantEvent) + Send + Sync,
{
    fn on_event(&self, event: &PlantEvent) {
        self(event)
    }
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn PlantObserver>;

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PlantObserver for LogObserver {
    fn on_event(&self, event: &PlantEvent) {
        match event {
            PlantEvent::PlantStarted { plant, workers } => {
                log::info!("{} processing oranges with {} workers", plant, workers);
            }
            PlantEvent::OrangeSupplied {
                plant,
                orange,
                supplied,
            } => {
                log::trace!("{} supplied orange #{} ({} total)", plant, orange, supplied);
            }
            PlantEvent::StageAdvanced {
                worker,
                orange,
                stage,
                ..
            } => {
                log::debug!("{} processed orange #{} to state: {}", worker, orange, stage);
            }
            PlantEvent::StageInterrupted {
                worker,
                orange,
                stage,
                ..
            } => {
                log::warn!("{} cut {} work on orange #{} short", worker, stage, orange);
            }
            PlantEvent::OrangeProcessed { worker, orange, .. } => {
                log::trace!("{} finished orange #{}", worker, orange);
            }
            PlantEvent::WorkerStopped {
                worker, processed, ..
            } => {
                log::debug!("{} stopping after {} oranges", worker, processed);
            }
            PlantEvent::ShutdownTimedOut {
                plant,
                stuck_workers,
            } => {
                log::warn!(
                    "{}: {} workers still busy after grace period, cancelling",
                    plant,
                    stuck_workers
                );
            }
            PlantEvent::PlantStopped { plant, stats } => {
                log::info!(
                    "{} done: {}/{} supplied/processed, {} bottles, {} wasted",
                    plant,
                    stats.supplied,
                    stats.processed,
                    stats.bottles(),
                    stats.waste()
                );
            }
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PlantObserver for NoopObserver {
    fn on_event(&self, _event: &PlantEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: SharedObserver = Arc::new(move |event: &PlantEvent| {
            sink.lock().push(event.clone());
        });

        let event = PlantEvent::PlantStarted {
            plant: Arc::from("Plant[1]"),
            workers: 2,
        };
        observer.on_event(&event);

        assert_eq!(seen.lock().as_slice(), &[event]);
    }

    #[test]
    fn test_log_and_noop_observers_accept_all_events() {
        let plant: Arc<str> = Arc::from("Plant[1]");
        let worker: Arc<str> = Arc::from("Plant[1]-worker-1");
        let events = vec![
            PlantEvent::PlantStarted {
                plant: Arc::clone(&plant),
                workers: 2,
            },
            PlantEvent::StageAdvanced {
                plant: Arc::clone(&plant),
                worker: Arc::clone(&worker),
                orange: 1,
                stage: Stage::Peeled,
            },
            PlantEvent::PlantStopped {
                plant: Arc::clone(&plant),
                stats: PlantStats::new(4, 4, 3),
            },
        ];

        for event in &events {
            LogObserver.on_event(event);
            NoopObserver.on_event(event);
        }
    }
}
