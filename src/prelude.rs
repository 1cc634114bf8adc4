//! Convenient re-exports for common types and traits

pub use crate::config::{FactoryConfig, PlantConfig};
pub use crate::core::{CancellationToken, Orange, PlantError, Result, Stage, StageCosts};
pub use crate::factory::{Factory, FactoryReport};
pub use crate::observer::{LogObserver, NoopObserver, PlantEvent, PlantObserver, SharedObserver};
pub use crate::plant::{Plant, PlantState, PlantStats, StopReport};
pub use crate::pool::WorkerStats;
