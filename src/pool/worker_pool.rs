//! The set of workers serving one plant

use super::worker::{Worker, WorkerStats};
use crate::core::{CancellationReason, CancellationToken, Result};
use crate::observer::PlantEvent;
use crate::plant::PlantCore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long to wait for cancelled workers before giving up on them
const CANCEL_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of [`WorkerPool::shutdown`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolShutdown {
    /// The grace period expired and workers were cancelled
    pub forced: bool,
    /// Workers still running when the grace period expired
    pub stuck_workers: usize,
    /// Workers that ignored cancellation and were left behind
    pub leaked: usize,
}

/// Fixed-size pool of workers consuming one plant's queue
#[derive(Debug)]
pub struct WorkerPool {
    core: Arc<PlantCore>,
    workers: Vec<Worker>,
    token: CancellationToken,
}

impl WorkerPool {
    /// Spawn `config.workers` workers bound to `core`
    ///
    /// If a spawn fails, the workers already started are cancelled and the
    /// error is returned.
    pub(crate) fn spawn(core: &Arc<PlantCore>) -> Result<Self> {
        let token = CancellationToken::new();
        let mut workers = Vec::with_capacity(core.config.workers);

        for id in 1..=core.config.workers {
            match Worker::spawn(id, Arc::clone(core), token.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    token.cancel_with_reason(CancellationReason::Custom(format!(
                        "failed to spawn worker {}",
                        id
                    )));
                    return Err(e);
                }
            }
        }

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_plant_start(&core.name, workers.len());

        Ok(Self {
            core: Arc::clone(core),
            workers,
            token,
        })
    }

    /// Number of workers in the pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Workers whose loop has not exited yet
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_finished()).count()
    }

    /// Per-worker statistics, in worker id order
    pub fn stats(&self) -> Vec<Arc<WorkerStats>> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Stop every worker
    ///
    /// Workers get `grace` to finish on their own; the queue should already
    /// be closed so idle workers leave immediately. Anything still running
    /// at the deadline is cancelled, which interrupts its current stage
    /// delay and makes it exit after finishing that orange.
    pub fn shutdown(self, grace: Duration) -> PoolShutdown {
        let deadline = Instant::now() + grace;
        let mut report = PoolShutdown::default();

        for worker in &self.workers {
            if !worker.wait_until(deadline) {
                report.stuck_workers += 1;
            }
        }

        if report.stuck_workers > 0 {
            report.forced = true;
            self.core.emit(PlantEvent::ShutdownTimedOut {
                plant: Arc::clone(&self.core.name),
                stuck_workers: report.stuck_workers,
            });
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_forced_shutdown(&self.core.name, report.stuck_workers);
            self.token
                .cancel_with_reason(CancellationReason::GracePeriodExpired(grace));
        }

        let join_deadline = Instant::now() + CANCEL_JOIN_TIMEOUT;
        for worker in self.workers {
            if !worker.wait_until(join_deadline) {
                log::error!(
                    "{} ignored cancellation; leaving its thread behind",
                    worker.name()
                );
                report.leaked += 1;
                worker.detach();
                continue;
            }
            if let Err(e) = worker.join() {
                log::error!("{}", e);
            }
        }

        report
    }
}
