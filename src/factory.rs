//! Runs several plants side by side for a fixed time

use crate::config::FactoryConfig;
use crate::core::Result;
use crate::observer::{LogObserver, SharedObserver};
use crate::plant::{Plant, PlantStats, StopReport};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread;

/// Aggregate result of a factory run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FactoryReport {
    /// Final statistics of each plant, in plant order
    pub plants: Vec<PlantStats>,
    /// Oranges supplied across all plants
    pub total_supplied: u64,
    /// Oranges processed across all plants
    pub total_processed: u64,
    /// Bottles filled across all plants
    pub total_bottles: u64,
    /// Leftover oranges across all plants
    pub total_wasted: u64,
    /// Plants whose workers had to be force-cancelled
    pub forced_shutdowns: usize,
}

impl FactoryReport {
    /// Build a report from each plant's final statistics
    ///
    /// Bottles and waste are summed per plant; oranges left over in one
    /// plant never complete a bottle in another.
    pub fn from_stats(plants: Vec<PlantStats>) -> Self {
        let mut report = Self::default();
        for stats in &plants {
            report.total_supplied += stats.supplied;
            report.total_processed += stats.processed;
            report.total_bottles += stats.bottles();
            report.total_wasted += stats.waste();
        }
        report.plants = plants;
        report
    }
}

impl fmt::Display for FactoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total provided/processed = {}/{}",
            self.total_supplied, self.total_processed
        )?;
        write!(
            f,
            "Created {}, wasted {} oranges",
            self.total_bottles, self.total_wasted
        )
    }
}

/// Coordinator for a multi-plant run
pub struct Factory {
    config: FactoryConfig,
    observer: SharedObserver,
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("config", &self.config)
            .finish()
    }
}

impl Factory {
    /// Create a factory whose plants report through [`LogObserver`]
    pub fn new(config: FactoryConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(LogObserver))
    }

    /// Create a factory whose plants share `observer`
    pub fn with_observer(config: FactoryConfig, observer: SharedObserver) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, observer })
    }

    /// Factory configuration
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Start every plant, let them run, then stop them one after another
    ///
    /// Plants are numbered from 1. If a plant fails to start, the plants
    /// already running are stopped when they are dropped.
    pub fn run(&self) -> Result<FactoryReport> {
        let plants = (1..=self.config.plants)
            .map(|id| {
                Plant::with_observer(id, self.config.plant.clone(), Arc::clone(&self.observer))
            })
            .collect::<Result<Vec<_>>>()?;

        for plant in &plants {
            plant.start()?;
        }
        log::info!(
            "{} plants running for {:?}",
            plants.len(),
            self.config.run_duration()
        );

        thread::sleep(self.config.run_duration());

        let reports = plants
            .iter()
            .map(Plant::stop)
            .collect::<Result<Vec<StopReport>>>()?;
        for plant in &plants {
            plant.wait_to_stop()?;
        }

        let mut report = FactoryReport::from_stats(reports.iter().map(|r| r.stats).collect());
        report.forced_shutdowns = reports.iter().filter(|r| r.forced).count();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;
    use crate::core::{PlantError, StageCosts};
    use crate::observer::{NoopObserver, PlantEvent};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[test]
    fn test_report_sums_per_plant() {
        // 4 + 5 processed: two wasted per plant, never pooled into a third bottle
        let report = FactoryReport::from_stats(vec![
            PlantStats::new(4, 4, 3),
            PlantStats::new(6, 5, 3),
        ]);
        assert_eq!(report.total_supplied, 10);
        assert_eq!(report.total_processed, 9);
        assert_eq!(report.total_bottles, 2);
        assert_eq!(report.total_wasted, 3);
    }

    #[test]
    fn test_report_display() {
        let report = FactoryReport::from_stats(vec![PlantStats::new(10, 10, 3)]);
        assert_eq!(
            report.to_string(),
            "Total provided/processed = 10/10\nCreated 3, wasted 1 oranges"
        );
    }

    #[test]
    fn test_new_rejects_zero_plants() {
        assert!(matches!(
            Factory::new(FactoryConfig::new(0)),
            Err(PlantError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_run_stops_every_plant() {
        let config = FactoryConfig::new(3)
            .with_run_duration(Duration::from_millis(100))
            .with_plant_config(
                PlantConfig::new(2)
                    .with_stage_costs(StageCosts::zero())
                    .with_production_interval(Duration::from_millis(2))
                    .with_poll_timeout(Duration::from_millis(20)),
            );

        let stopped = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stopped);
        let observer: SharedObserver = Arc::new(move |event: &PlantEvent| {
            if let PlantEvent::PlantStopped { plant, .. } = event {
                sink.lock().push(plant.to_string());
            }
        });

        let report = Factory::with_observer(config, observer)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.plants.len(), 3);
        assert!(report.total_supplied > 0);
        assert_eq!(report.total_processed, report.total_supplied);
        assert_eq!(report.forced_shutdowns, 0);
        assert_eq!(
            stopped.lock().as_slice(),
            &["Plant[1]", "Plant[2]", "Plant[3]"]
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = Factory::with_observer(
            FactoryConfig::new(1)
                .with_run_duration(Duration::from_millis(20))
                .with_plant_config(
                    PlantConfig::new(1)
                        .with_stage_costs(StageCosts::zero())
                        .with_poll_timeout(Duration::from_millis(20)),
                ),
            Arc::new(NoopObserver),
        )
        .unwrap()
        .run()
        .unwrap();

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["plants"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["total_processed"], json["total_supplied"]);
    }
}
