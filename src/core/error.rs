//! Error types for the bottling plant

use crate::core::orange::Stage;

/// Result type for plant operations
pub type Result<T> = std::result::Result<T, PlantError>;

/// Errors that can occur while running a plant
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlantError {
    /// Attempted to advance an orange past its terminal stage
    #[error("Invalid transition: orange is already {stage}")]
    InvalidTransition {
        /// Stage the orange was in when the transition was attempted
        stage: Stage,
    },

    /// A blocking wait was cut short by cancellation
    #[error("Wait interrupted: {context}")]
    InterruptedWait {
        /// What was being waited on
        context: String,
    },

    /// Workers did not exit within the shutdown grace period
    #[error("Plant '{plant}' workers did not stop within {grace_ms}ms ({stuck_workers} still running)")]
    ShutdownTimeout {
        /// Name of the plant
        plant: String,
        /// Grace period in milliseconds
        grace_ms: u64,
        /// Number of workers still running when the grace period expired
        stuck_workers: usize,
    },

    /// Lifecycle operation not allowed in the plant's current state
    #[error("Plant '{plant}' cannot {operation} while {state}")]
    InvalidState {
        /// Name of the plant
        plant: String,
        /// Current lifecycle state
        state: String,
        /// Rejected operation
        operation: &'static str,
    },

    /// Failed to spawn a producer or worker thread
    #[error("Failed to spawn thread '{thread_name}': {message}")]
    SpawnError {
        /// Name of the thread that failed to spawn
        thread_name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a producer or worker thread
    #[error("Failed to join thread '{thread_name}': {message}")]
    JoinError {
        /// Name of the thread that failed to join
        thread_name: String,
        /// Error message
        message: String,
    },

    /// Queue was closed while an orange was being enqueued
    #[error("Work queue is closed")]
    QueueClosed,

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read configuration file '{path}'")]
    ConfigIo {
        /// Path of the configuration file
        path: String,
        /// Source IO error
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("Failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),
}

impl PlantError {
    /// Create an invalid transition error
    pub fn invalid_transition(stage: Stage) -> Self {
        PlantError::InvalidTransition { stage }
    }

    /// Create an interrupted wait error
    pub fn interrupted(context: impl Into<String>) -> Self {
        PlantError::InterruptedWait {
            context: context.into(),
        }
    }

    /// Create a shutdown timeout error
    pub fn shutdown_timeout(plant: impl Into<String>, grace_ms: u64, stuck_workers: usize) -> Self {
        PlantError::ShutdownTimeout {
            plant: plant.into(),
            grace_ms,
            stuck_workers,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(
        plant: impl Into<String>,
        state: impl ToString,
        operation: &'static str,
    ) -> Self {
        PlantError::InvalidState {
            plant: plant.into(),
            state: state.to_string(),
            operation,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(thread_name: impl Into<String>, source: std::io::Error) -> Self {
        PlantError::SpawnError {
            thread_name: thread_name.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_name: impl Into<String>, message: impl Into<String>) -> Self {
        PlantError::JoinError {
            thread_name: thread_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PlantError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an expected timing event rather than a defect
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            PlantError::InterruptedWait { .. } | PlantError::ShutdownTimeout { .. }
        )
    }
}

/// Extracts a readable message from a thread panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
