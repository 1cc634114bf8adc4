//! # Bottling Plant
//!
//! A multi-threaded juice bottling simulation: each plant runs a producer
//! that supplies oranges onto a queue and a pool of workers that peel,
//! squeeze and bottle them.
//!
//! ## Features
//!
//! - **Orange State Machine**: Fixed stage sequence with per-stage simulated cost
//! - **Work Queue**: FIFO crossbeam queue, unbounded or bounded, with drain signalling
//! - **Worker Pool**: Graceful shutdown with a grace period, then forced cancellation
//! - **Drain Before Exit**: Stopping a plant finishes every queued orange
//! - **Statistics**: Supplied, processed, bottles and waste per plant
//! - **Observers**: Every tick and transition is reported as a `PlantEvent`
//!
//! ## Quick Start
//!
//! ```rust
//! use bottling_plant::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = PlantConfig::new(4)
//!     .with_stage_costs(StageCosts::zero())
//!     .with_production_interval(Duration::from_millis(1))
//!     .with_poll_timeout(Duration::from_millis(50));
//!
//! let plant = Plant::new(1, config)?;
//! plant.start()?;
//! std::thread::sleep(Duration::from_millis(100));
//!
//! let report = plant.stop()?;
//! plant.wait_to_stop()?;
//!
//! assert_eq!(report.stats.processed, report.stats.supplied);
//! println!("{} bottles, {} wasted", plant.bottles(), plant.waste());
//! # Ok(())
//! # }
//! ```
//!
//! ## Several Plants
//!
//! ```rust
//! use bottling_plant::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = FactoryConfig::new(2)
//!     .with_run_duration(Duration::from_millis(100))
//!     .with_plant_config(
//!         PlantConfig::new(2)
//!             .with_stage_costs(StageCosts::zero())
//!             .with_poll_timeout(Duration::from_millis(50)),
//!     );
//!
//! let report = Factory::new(config)?.run()?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Observing Progress
//!
//! ```rust
//! use bottling_plant::prelude::*;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let transitions = Arc::new(AtomicU64::new(0));
//! let counter = Arc::clone(&transitions);
//!
//! let observer: SharedObserver = Arc::new(move |event: &PlantEvent| {
//!     if let PlantEvent::StageAdvanced { .. } = event {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     }
//! });
//!
//! let config = PlantConfig::new(1)
//!     .with_stage_costs(StageCosts::zero())
//!     .with_poll_timeout(Duration::from_millis(50))
//!     .with_supply_limit(5);
//!
//! let plant = Plant::with_observer(1, config, observer)?;
//! plant.start()?;
//! plant.wait_to_stop()?;
//! plant.stop()?;
//!
//! assert_eq!(transitions.load(Ordering::Relaxed), 20);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod factory;
pub mod observer;
pub mod plant;
pub mod pool;
pub mod prelude;
pub mod queue;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use config::{FactoryConfig, PlantConfig};
pub use core::{CancellationToken, Orange, PlantError, Result, Stage, StageCosts};
pub use factory::{Factory, FactoryReport};
pub use observer::{LogObserver, NoopObserver, PlantEvent, PlantObserver, SharedObserver};
pub use plant::{Plant, PlantState, PlantStats, StopReport};
