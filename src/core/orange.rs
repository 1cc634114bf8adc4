//! The orange state machine
//!
//! An [`Orange`] walks the fixed stage sequence
//! `Fetched → Peeled → Squeezed → Bottled → Processed`. Every stage has a
//! simulated cost that is paid, as a blocking delay, before the orange moves
//! on. Creating an orange pays the `Fetched` cost.

use crate::core::{CancellationToken, PlantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Processing stage of an orange, in strict order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Raw orange acquired from the supplier
    Fetched,
    /// Peel removed
    Peeled,
    /// Juice extracted
    Squeezed,
    /// Juice poured into a bottle
    Bottled,
    /// Terminal stage
    Processed,
}

impl Stage {
    /// All stages in processing order
    pub const ALL: [Stage; 5] = [
        Stage::Fetched,
        Stage::Peeled,
        Stage::Squeezed,
        Stage::Bottled,
        Stage::Processed,
    ];

    /// Successor stage, `None` for the terminal stage
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Fetched => Some(Stage::Peeled),
            Stage::Peeled => Some(Stage::Squeezed),
            Stage::Squeezed => Some(Stage::Bottled),
            Stage::Bottled => Some(Stage::Processed),
            Stage::Processed => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Lowercase stage name
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetched => "fetched",
            Stage::Peeled => "peeled",
            Stage::Squeezed => "squeezed",
            Stage::Bottled => "bottled",
            Stage::Processed => "processed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulated cost of each stage, in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCosts {
    /// Cost of acquiring a raw orange
    pub fetched_ms: u64,
    /// Cost of peeling
    pub peeled_ms: u64,
    /// Cost of squeezing
    pub squeezed_ms: u64,
    /// Cost of bottling
    pub bottled_ms: u64,
    /// Cost of the final hand-off
    pub processed_ms: u64,
}

impl Default for StageCosts {
    fn default() -> Self {
        Self {
            fetched_ms: 15,
            peeled_ms: 38,
            squeezed_ms: 29,
            bottled_ms: 17,
            processed_ms: 1,
        }
    }
}

impl StageCosts {
    /// Costs where every stage is free
    pub fn zero() -> Self {
        Self::uniform(Duration::ZERO)
    }

    /// Same cost for every stage
    pub fn uniform(cost: Duration) -> Self {
        let ms = cost.as_millis() as u64;
        Self {
            fetched_ms: ms,
            peeled_ms: ms,
            squeezed_ms: ms,
            bottled_ms: ms,
            processed_ms: ms,
        }
    }

    /// Cost of the work performed while an orange sits in `stage`
    pub fn cost(&self, stage: Stage) -> Duration {
        let ms = match stage {
            Stage::Fetched => self.fetched_ms,
            Stage::Peeled => self.peeled_ms,
            Stage::Squeezed => self.squeezed_ms,
            Stage::Bottled => self.bottled_ms,
            Stage::Processed => self.processed_ms,
        };
        Duration::from_millis(ms)
    }
}

/// One completed call to [`Orange::advance`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Stage whose work was performed
    pub from: Stage,
    /// Stage the orange is in now
    pub to: Stage,
    /// The stage delay was cut short by cancellation
    pub interrupted: bool,
}

/// A single orange moving through the plant
#[derive(Debug, PartialEq, Eq)]
pub struct Orange {
    id: u64,
    stage: Stage,
}

impl Orange {
    /// Acquire a new orange, paying the `Fetched` cost up front
    ///
    /// An interrupted acquisition still yields an orange.
    pub fn fetch(id: u64, costs: &StageCosts, token: &CancellationToken) -> Self {
        let orange = Self {
            id,
            stage: Stage::Fetched,
        };
        orange.work(costs, token);
        orange
    }

    /// Per-plant sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether the orange has reached the terminal stage
    pub fn is_processed(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Perform the current stage's work and move to the next stage
    ///
    /// # Errors
    ///
    /// Returns `PlantError::InvalidTransition` if the orange is already
    /// processed; the stage is left unchanged.
    pub fn advance(&mut self, costs: &StageCosts, token: &CancellationToken) -> Result<Transition> {
        let next = self
            .stage
            .next()
            .ok_or_else(|| PlantError::invalid_transition(self.stage))?;

        let from = self.stage;
        let interrupted = !self.work(costs, token);
        self.stage = next;

        Ok(Transition {
            from,
            to: next,
            interrupted,
        })
    }

    /// Returns false if the delay was interrupted
    fn work(&self, costs: &StageCosts, token: &CancellationToken) -> bool {
        match token.sleep(costs.cost(self.stage)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Incomplete {} work on orange #{}, juice may be bad: {}",
                    self.stage,
                    self.id,
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_stage_order() {
        for pair in Stage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert!(Stage::Processed.is_terminal());
        assert!(!Stage::Bottled.is_terminal());
    }

    #[test]
    fn test_default_costs() {
        let costs = StageCosts::default();
        assert_eq!(costs.cost(Stage::Fetched), Duration::from_millis(15));
        assert_eq!(costs.cost(Stage::Peeled), Duration::from_millis(38));
        assert_eq!(costs.cost(Stage::Squeezed), Duration::from_millis(29));
        assert_eq!(costs.cost(Stage::Bottled), Duration::from_millis(17));
        assert_eq!(costs.cost(Stage::Processed), Duration::from_millis(1));
    }

    #[test]
    fn test_advance_reaches_processed_in_four_steps() {
        let costs = StageCosts::zero();
        let token = CancellationToken::new();
        let mut orange = Orange::fetch(1, &costs, &token);
        assert_eq!(orange.stage(), Stage::Fetched);

        let mut visited = vec![orange.stage()];
        let mut calls = 0;
        while !orange.is_processed() {
            let transition = orange.advance(&costs, &token).expect("advance failed");
            assert_eq!(transition.from, *visited.last().unwrap());
            assert!(!transition.interrupted);
            visited.push(transition.to);
            calls += 1;
        }

        assert_eq!(calls, Stage::ALL.len() - 1);
        assert_eq!(visited, Stage::ALL.to_vec());
    }

    #[test]
    fn test_advance_processed_orange_fails() {
        let costs = StageCosts::zero();
        let token = CancellationToken::new();
        let mut orange = Orange::fetch(7, &costs, &token);
        for _ in 0..4 {
            orange.advance(&costs, &token).unwrap();
        }

        let err = orange.advance(&costs, &token).unwrap_err();
        assert!(matches!(
            err,
            PlantError::InvalidTransition {
                stage: Stage::Processed
            }
        ));
        assert_eq!(orange.stage(), Stage::Processed);
        assert!(orange.advance(&costs, &token).is_err());
    }

    #[test]
    fn test_advance_pays_current_stage_cost() {
        let costs = StageCosts {
            fetched_ms: 0,
            peeled_ms: 30,
            ..StageCosts::zero()
        };
        let token = CancellationToken::new();
        let mut orange = Orange::fetch(1, &costs, &token);

        // Fetched -> Peeled pays the fetched cost (free)
        let start = Instant::now();
        orange.advance(&costs, &token).unwrap();
        assert!(start.elapsed() < Duration::from_millis(30));

        // Peeled -> Squeezed pays the peeling cost
        let start = Instant::now();
        orange.advance(&costs, &token).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_interrupted_work_still_transitions() {
        let costs = StageCosts::uniform(Duration::from_secs(10));
        let token = CancellationToken::new();
        token.cancel();

        let start = Instant::now();
        let mut orange = Orange::fetch(3, &costs, &token);
        let transition = orange.advance(&costs, &token).unwrap();

        assert!(transition.interrupted);
        assert_eq!(transition.to, Stage::Peeled);
        assert_eq!(orange.stage(), Stage::Peeled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stage_costs_deserialize_partial() {
        let costs: StageCosts = serde_json::from_str(r#"{"peeled_ms": 5}"#).unwrap();
        assert_eq!(costs.peeled_ms, 5);
        assert_eq!(costs.fetched_ms, 15);
    }
}
