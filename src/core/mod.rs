//! Core types for the bottling plant

pub mod cancellation;
pub mod error;
pub mod orange;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{PlantError, Result};
pub use orange::{Orange, Stage, StageCosts, Transition};
