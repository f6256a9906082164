//! Per-round records: what the instrument returned, and what the model saw.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::Action;

/// Raw result of one acquisition, as returned by the measurement capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Objective scores keyed by objective label.
    pub scores: HashMap<String, f64>,
    /// Wall-clock acquisition time in seconds.
    pub elapsed_s: f64,
    /// Opaque payload from the driver (artifact path, stack metadata, ...).
    /// Dropped before persisting when the thrash-data policy is active.
    pub artifact: Option<serde_json::Value>,
}

impl Measurement {
    pub fn new(scores: HashMap<String, f64>, elapsed_s: f64) -> Self {
        Self {
            scores,
            elapsed_s,
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: serde_json::Value) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// One completed acquisition at a grid action. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub round: usize,
    pub action: Action,
    /// Raw scores ordered to match the session's enabled objective list.
    pub scores: Vec<f64>,
    pub elapsed_s: f64,
    /// Whether the raw artifact was discarded under the thrash-data policy.
    pub thrashed: bool,
    pub timestamp: DateTime<Utc>,
}

/// The scalar reward derived from one observation, as fed to the regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub round: usize,
    pub action: Action,
    pub reward: f64,
    /// Noise upper bound in effect when this reward was recorded.
    pub noise_bound: f64,
    /// Set when the rating service was unavailable and the weighted
    /// combination was used as a fallback for this round.
    pub degraded: bool,
}
