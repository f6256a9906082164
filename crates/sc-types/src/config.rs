//! Session configuration surface.
//!
//! An external builder (CLI or GUI) assembles a [`SessionConfig`] and hands it
//! to the session; `validate` runs before anything touches the instrument.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ConfigError;
use crate::objective::ObjectiveSpec;
use crate::params::Parameter;

/// Unique session identifier.
pub type SessionId = Uuid;

/// How per-objective scores become the one scalar reward per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Fixed weighted combination of noise-normalized scores.
    Weighted,
    /// Remote quality-rating service supplies the scalar reward.
    QualityAssisted,
    /// Remote trade-off service supplies the scalar reward.
    FullyAutomatic,
}

impl DecisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::QualityAssisted => "quality_assisted",
            Self::FullyAutomatic => "fully_automatic",
        }
    }
}

/// Where the per-round reward noise bound comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMode {
    /// Fixed caller-supplied upper bound.
    Configured { bound: f64 },
    /// Pooled sample standard deviation over repeated actions in the current
    /// history, falling back to `fallback` below two samples per action.
    Estimated { fallback: f64 },
}

/// Address of a remote rating or trade-off service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub address: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub retries: u32,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            timeout_ms: 5_000,
            retries: 1,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// Top-level configuration for an optimization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: SessionId,
    pub name: String,

    /// Enabled parameters; the action space is their Cartesian grid.
    pub parameters: Vec<Parameter>,
    /// Enabled objectives in priority order.
    pub objectives: Vec<ObjectiveSpec>,

    /// Include elapsed acquisition time as a minimize term in the weighted
    /// combination and in delegated rating requests.
    pub with_time: bool,
    pub time_weight: f64,
    pub time_noise_ub: f64,

    /// Inject mirrored boundary points into the regression input.
    pub pseudo_points: bool,
    /// Drop raw acquisition artifacts after scoring.
    pub thrash_data: bool,
    /// Whether warm start keeps rounds whose artifacts were thrashed.
    pub import_thrashed: bool,

    pub policy: DecisionPolicy,
    pub noise: NoiseMode,

    /// RBF kernel bandwidth in normalized coordinates; `None` selects the
    /// dims/3 rule of thumb.
    pub bandwidth: Option<f64>,
    pub prior_mean: f64,
    pub prior_variance: f64,

    /// Stop after this many rounds; `None` runs until the stop handle fires.
    pub max_rounds: Option<usize>,
    pub measure_timeout_s: f64,
    /// RNG seed for the Thompson sampler; `None` seeds from entropy.
    pub seed: Option<u64>,

    pub quality_service: Option<ServiceEndpoint>,
    pub tradeoff_service: Option<ServiceEndpoint>,

    /// Folder this session's records are written to.
    pub output_dir: PathBuf,
    /// Previous session folders imported at warm start.
    pub previous: Vec<PathBuf>,

    pub created_at: DateTime<Utc>,
}

impl SessionConfig {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        objectives: Vec<ObjectiveSpec>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parameters,
            objectives,
            with_time: false,
            time_weight: 1.0,
            time_noise_ub: 1.0,
            pseudo_points: false,
            thrash_data: false,
            import_thrashed: true,
            policy: DecisionPolicy::Weighted,
            noise: NoiseMode::Configured { bound: 1.0 },
            bandwidth: None,
            prior_mean: 0.0,
            prior_variance: 1.0,
            max_rounds: None,
            measure_timeout_s: 120.0,
            seed: None,
            quality_service: None,
            tradeoff_service: None,
            output_dir: output_dir.into(),
            previous: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pseudo_points(mut self, enabled: bool) -> Self {
        self.pseudo_points = enabled;
        self
    }

    pub fn with_time(mut self, enabled: bool) -> Self {
        self.with_time = enabled;
        self
    }

    pub fn with_previous(mut self, folders: Vec<PathBuf>) -> Self {
        self.previous = folders;
        self
    }

    pub fn with_noise(mut self, noise: NoiseMode) -> Self {
        self.noise = noise;
        self
    }

    /// Validate the configuration. Runs synchronously at `Initializing`,
    /// before any measurement is taken.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parameters.is_empty() {
            return Err(ConfigError::NoParameterSelected);
        }
        for param in &self.parameters {
            param.validate()?;
        }
        if self.objectives.is_empty() {
            return Err(ConfigError::NoObjectiveSelected);
        }
        for obj in &self.objectives {
            if !(obj.noise_ub > 0.0) || !obj.noise_ub.is_finite() {
                return Err(ConfigError::InvalidNoiseBound {
                    name: obj.label().to_string(),
                    value: obj.noise_ub,
                });
            }
            if !(obj.weight > 0.0) || !obj.weight.is_finite() {
                return Err(ConfigError::InvalidWeight {
                    name: obj.label().to_string(),
                    value: obj.weight,
                });
            }
        }
        if !(self.measure_timeout_s > 0.0) {
            return Err(ConfigError::InvalidTimeout {
                value: self.measure_timeout_s,
            });
        }
        match self.policy {
            DecisionPolicy::QualityAssisted if self.quality_service.is_none() => {
                Err(ConfigError::ServiceNotConfigured {
                    policy: self.policy.as_str().to_string(),
                    role: "quality".to_string(),
                })
            }
            DecisionPolicy::FullyAutomatic if self.tradeoff_service.is_none() => {
                Err(ConfigError::ServiceNotConfigured {
                    policy: self.policy.as_str().to_string(),
                    role: "tradeoff".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}
