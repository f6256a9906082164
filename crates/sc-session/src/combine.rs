//! Multi-objective reward combination.
//!
//! Turns one round's per-objective raw scores into the scalar reward the
//! regression model consumes. Three policies: the single enabled objective's
//! score (noise-ceiling clipped), a weighted sum of noise-normalized scores,
//! or delegation to a remote rating service.

use std::sync::Arc;

use sc_rating::{RatingRequest, RatingService};
use sc_types::{
    ConfigError, DecisionPolicy, ObjectiveSpec, Polarity, RatingError, SessionConfig,
};

/// Stateless combiner configured once per session.
pub struct RewardCombiner {
    objectives: Vec<ObjectiveSpec>,
    labels: Vec<String>,
    with_time: bool,
    time_weight: f64,
    time_noise_ub: f64,
    policy: DecisionPolicy,
    service: Option<Arc<dyn RatingService>>,
}

impl RewardCombiner {
    pub fn new(
        config: &SessionConfig,
        service: Option<Arc<dyn RatingService>>,
    ) -> Result<Self, ConfigError> {
        if config.objectives.is_empty() {
            return Err(ConfigError::NoObjectiveSelected);
        }
        if config.policy != DecisionPolicy::Weighted && service.is_none() {
            let role = match config.policy {
                DecisionPolicy::QualityAssisted => "quality",
                _ => "tradeoff",
            };
            return Err(ConfigError::ServiceNotConfigured {
                policy: config.policy.as_str().to_string(),
                role: role.to_string(),
            });
        }
        Ok(Self {
            objectives: config.objectives.clone(),
            labels: config
                .objectives
                .iter()
                .map(|o| o.label().to_string())
                .collect(),
            with_time: config.with_time,
            time_weight: config.time_weight,
            time_noise_ub: config.time_noise_ub,
            policy: config.policy,
            service,
        })
    }

    /// Whether rewards come from a remote service.
    pub fn is_delegated(&self) -> bool {
        self.policy != DecisionPolicy::Weighted
    }

    /// Polarity of the combined reward as seen by the sampler. Normalized and
    /// delegated rewards are always "more is better"; only the raw
    /// single-objective policy inherits the objective's own polarity.
    pub fn polarity(&self) -> Polarity {
        if self.is_single() {
            self.objectives[0].polarity()
        } else {
            Polarity::Maximize
        }
    }

    fn is_single(&self) -> bool {
        self.policy == DecisionPolicy::Weighted && self.objectives.len() == 1 && !self.with_time
    }

    /// Combine one round's scores. Delegated policies call out to the rating
    /// service; the caller handles service failure by falling back to
    /// [`RewardCombiner::fallback`] for that round.
    pub async fn combine(&self, scores: &[f64], elapsed_s: f64) -> Result<f64, RatingError> {
        match &self.service {
            Some(service) if self.is_delegated() => {
                let request = RatingRequest {
                    objectives: self.labels.clone(),
                    scores: scores.to_vec(),
                    elapsed_s: self.with_time.then_some(elapsed_s),
                };
                service.rate(&request).await
            }
            _ => Ok(self.combine_local(scores, elapsed_s)),
        }
    }

    /// The local (never remote) combination, also used to recombine imported
    /// warm-start observations under the current configuration.
    pub fn combine_local(&self, scores: &[f64], elapsed_s: f64) -> f64 {
        if self.is_single() {
            let obj = &self.objectives[0];
            // the noise ceiling saturates outlier scores
            scores[0].clamp(-obj.noise_ub, obj.noise_ub)
        } else {
            self.weighted(scores, elapsed_s)
        }
    }

    /// Weighted/normalized combination, used when a delegated round loses its
    /// service.
    pub fn fallback(&self, scores: &[f64], elapsed_s: f64) -> f64 {
        self.weighted(scores, elapsed_s)
    }

    /// Weighted sum of scores divided by their noise upper bounds, signed by
    /// polarity; elapsed time enters as a minimize term when enabled.
    fn weighted(&self, scores: &[f64], elapsed_s: f64) -> f64 {
        let mut reward = 0.0;
        for (obj, score) in self.objectives.iter().zip(scores) {
            let normalized = score / obj.noise_ub;
            reward += match obj.polarity() {
                Polarity::Maximize => obj.weight * normalized,
                Polarity::Minimize => -obj.weight * normalized,
            };
        }
        if self.with_time {
            reward -= self.time_weight * elapsed_s / self.time_noise_ub;
        }
        reward
    }
}
