//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled, workers run inside a `worker` span
//! and the plant emits metric-shaped tracing events that a subscriber can
//! turn into counters and histograms.
//!
//! # Example
//!
//! ```rust,ignore
//! use bottling_plant::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("bottling_plant=debug".parse().unwrap()))
//!     .init();
//!
//! let plant = Plant::new(1, PlantConfig::default());
//! plant.start()?;
//! ```

/// Metrics recording functions for observability.
///
/// These functions emit tracing events that can be consumed by
/// metrics collection systems like Prometheus via tracing-opentelemetry.
pub mod metrics {
    use std::time::Duration;

    /// Records an orange entering the queue.
    #[inline]
    pub fn record_orange_supplied(queue_depth: usize) {
        tracing::trace!(
            counter.oranges_supplied = 1,
            gauge.queue_depth = queue_depth as i64,
            "orange supplied"
        );
    }

    /// Records an orange reaching the terminal stage.
    #[inline]
    pub fn record_orange_processed(duration: Duration) {
        tracing::trace!(
            counter.oranges_processed = 1,
            histogram.orange_duration_ms = duration.as_millis() as u64,
            "orange processed"
        );
    }

    /// Records plant startup.
    #[inline]
    pub fn record_plant_start(plant: &str, workers: usize) {
        tracing::info!(plant = plant, workers = workers, "plant started");
    }

    /// Records workers force-cancelled after the grace period.
    #[inline]
    pub fn record_forced_shutdown(plant: &str, stuck_workers: usize) {
        tracing::warn!(
            plant = plant,
            counter.forced_shutdowns = 1,
            stuck_workers = stuck_workers,
            "grace period expired"
        );
    }

    /// Records plant shutdown.
    #[inline]
    pub fn record_plant_stop(plant: &str, supplied: u64, processed: u64) {
        tracing::info!(
            plant = plant,
            oranges_supplied = supplied,
            oranges_processed = processed,
            "plant stopped"
        );
    }
}
