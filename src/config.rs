//! Plant and factory configuration
//!
//! Every timing constant of the simulation lives here so tests can shrink
//! them. Defaults reproduce the reference plant: 2 workers, 3 oranges per
//! bottle, a new orange every 50ms, 1s worker polls and a 2s grace period.
//!
//! Both structs deserialize from JSON with missing fields falling back to
//! their defaults:
//!
//! ```rust
//! use bottling_plant::FactoryConfig;
//!
//! let config = FactoryConfig::from_json_str(r#"{
//!     "plants": 4,
//!     "run_duration_ms": 2000,
//!     "plant": { "workers": 8, "queue_capacity": 64 }
//! }"#).unwrap();
//!
//! assert_eq!(config.plants, 4);
//! assert_eq!(config.plant.workers, 8);
//! assert_eq!(config.plant.oranges_per_bottle, 3);
//! ```

use crate::core::{PlantError, Result, StageCosts};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a single plant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Oranges needed to fill one bottle
    pub oranges_per_bottle: u64,
    /// Pause between two oranges supplied by the producer
    pub production_interval_ms: u64,
    /// How long a worker waits on the queue before re-checking for shutdown
    pub poll_timeout_ms: u64,
    /// How long `stop()` waits for workers before force-cancelling them
    pub grace_period_ms: u64,
    /// Upper bound on each wait for the queue to drain
    pub drain_check_interval_ms: u64,
    /// Queue capacity (`None` = unbounded, the producer never blocks)
    pub queue_capacity: Option<usize>,
    /// Stop producing after this many oranges (`None` = until stopped)
    pub supply_limit: Option<u64>,
    /// Simulated cost of each stage
    pub stage_costs: StageCosts,
    /// Prefix for worker thread names
    pub thread_name_prefix: String,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            oranges_per_bottle: 3,
            production_interval_ms: 50,
            poll_timeout_ms: 1000,
            grace_period_ms: 2000,
            drain_check_interval_ms: 100,
            queue_capacity: None,
            supply_limit: None,
            stage_costs: StageCosts::default(),
            thread_name_prefix: "worker".to_string(),
        }
    }
}

impl PlantConfig {
    /// Create a new configuration with the specified number of workers
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Set the bottle ratio
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_oranges_per_bottle(mut self, ratio: u64) -> Self {
        self.oranges_per_bottle = ratio;
        self
    }

    /// Set the producer's inter-arrival delay
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_production_interval(mut self, interval: Duration) -> Self {
        self.production_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the worker poll timeout.
    ///
    /// Shorter timeouts let idle workers notice shutdown sooner at the cost
    /// of more wakeups.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the shutdown grace period
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    /// Set the drain re-check interval
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_drain_check_interval(mut self, interval: Duration) -> Self {
        self.drain_check_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Bound the queue, giving the producer real backpressure
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Stop producing after `limit` oranges
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_supply_limit(mut self, limit: u64) -> Self {
        self.supply_limit = Some(limit);
        self
    }

    /// Set the stage costs
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stage_costs(mut self, costs: StageCosts) -> Self {
        self.stage_costs = costs;
        self
    }

    /// Set the worker thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Producer inter-arrival delay
    pub fn production_interval(&self) -> Duration {
        Duration::from_millis(self.production_interval_ms)
    }

    /// Worker poll timeout
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Shutdown grace period
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Drain re-check interval
    pub fn drain_check_interval(&self) -> Duration {
        Duration::from_millis(self.drain_check_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PlantError::invalid_config(
                "workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.oranges_per_bottle == 0 {
            return Err(PlantError::invalid_config(
                "oranges_per_bottle",
                "At least one orange is needed per bottle",
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(PlantError::invalid_config(
                "poll_timeout_ms",
                "Poll timeout must be non-zero",
            ));
        }
        if self.drain_check_interval_ms == 0 {
            return Err(PlantError::invalid_config(
                "drain_check_interval_ms",
                "Drain check interval must be non-zero",
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(PlantError::invalid_config(
                "queue_capacity",
                "A bounded queue needs room for at least one orange",
            ));
        }
        Ok(())
    }
}

/// Configuration for a multi-plant run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Number of plants to run concurrently
    pub plants: usize,
    /// How long the plants produce before being stopped
    pub run_duration_ms: u64,
    /// Configuration shared by every plant
    pub plant: PlantConfig,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            plants: 2,
            run_duration_ms: 10_000,
            plant: PlantConfig::default(),
        }
    }
}

impl FactoryConfig {
    /// Create a configuration for `plants` plants with default plant settings
    #[must_use]
    pub fn new(plants: usize) -> Self {
        Self {
            plants,
            ..Default::default()
        }
    }

    /// Set the run duration
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration_ms = duration.as_millis() as u64;
        self
    }

    /// Set the per-plant configuration
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_plant_config(mut self, plant: PlantConfig) -> Self {
        self.plant = plant;
        self
    }

    /// Run duration
    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PlantError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.plants == 0 {
            return Err(PlantError::invalid_config(
                "plants",
                "Number of plants must be greater than 0",
            ));
        }
        self.plant.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_plant() {
        let config = PlantConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.oranges_per_bottle, 3);
        assert_eq!(config.production_interval(), Duration::from_millis(50));
        assert_eq!(config.poll_timeout(), Duration::from_millis(1000));
        assert_eq!(config.grace_period(), Duration::from_millis(2000));
        assert!(config.queue_capacity.is_none());

        let factory = FactoryConfig::default();
        assert_eq!(factory.plants, 2);
        assert_eq!(factory.run_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = PlantConfig::new(8)
            .with_oranges_per_bottle(5)
            .with_poll_timeout(Duration::from_millis(20))
            .with_grace_period(Duration::from_millis(300))
            .with_queue_capacity(16)
            .with_supply_limit(100)
            .with_thread_name_prefix("squeezer");

        assert_eq!(config.workers, 8);
        assert_eq!(config.oranges_per_bottle, 5);
        assert_eq!(config.poll_timeout_ms, 20);
        assert_eq!(config.grace_period_ms, 300);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.supply_limit, Some(100));
        assert_eq!(config.thread_name_prefix, "squeezer");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            (PlantConfig::new(0), "workers"),
            (
                PlantConfig::default().with_oranges_per_bottle(0),
                "oranges_per_bottle",
            ),
            (
                PlantConfig::default().with_poll_timeout(Duration::ZERO),
                "poll_timeout_ms",
            ),
            (PlantConfig::default().with_queue_capacity(0), "queue_capacity"),
        ];

        for (config, expected) in cases {
            match config.validate() {
                Err(PlantError::InvalidConfig { parameter, .. }) => assert_eq!(parameter, expected),
                other => panic!("expected InvalidConfig for {}, got {:?}", expected, other),
            }
        }

        assert!(FactoryConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(matches!(
            FactoryConfig::from_json_str("{ not json"),
            Err(PlantError::ConfigParse(_))
        ));
        assert!(matches!(
            FactoryConfig::from_json_str(r#"{"plant": {"workers": 0}}"#),
            Err(PlantError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let config = FactoryConfig::new(3)
            .with_run_duration(Duration::from_millis(500))
            .with_plant_config(PlantConfig::new(4).with_stage_costs(StageCosts::zero()));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = FactoryConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = FactoryConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PlantError::ConfigIo { .. }));
    }
}
