//! Kernel-weighted posterior estimation over the action grid.
//!
//! The regressor is a pure function of (action space, history snapshot,
//! noise bound): it holds no mutable state, so recomputation is idempotent
//! and the per-action loop parallelizes freely.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sc_types::ActionSpace;

/// Below this total kernel mass an action is treated as unobserved and falls
/// back to the prior.
const MIN_TOTAL_WEIGHT: f64 = 1e-12;

/// A single (action, reward) pair as consumed by the regressor, in physical
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardPoint {
    pub values: Vec<f64>,
    pub reward: f64,
}

impl RewardPoint {
    pub fn new(values: Vec<f64>, reward: f64) -> Self {
        Self { values, reward }
    }
}

/// Posterior mean and variance per grid action, index-aligned with the
/// action space's enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

impl Posterior {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Tunables for the kernel estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConfig {
    /// RBF bandwidth, uniform across normalized [0, 1] coordinates.
    pub bandwidth: f64,
    /// Mean reported for actions with no kernel mass.
    pub prior_mean: f64,
    /// Variance reported for actions with no kernel mass.
    pub prior_variance: f64,
}

impl KernelConfig {
    pub fn new(bandwidth: f64, prior_mean: f64, prior_variance: f64) -> Self {
        Self {
            bandwidth,
            prior_mean,
            prior_variance,
        }
    }

    /// Bandwidth rule of thumb: one third of the normalized range per
    /// dimension, widened with dimensionality.
    pub fn rule_of_thumb(dims: usize) -> f64 {
        dims as f64 / 3.0
    }
}

/// RBF kernel regressor producing per-action posterior mean and variance.
#[derive(Debug, Clone)]
pub struct KernelRegressor {
    config: KernelConfig,
}

impl KernelRegressor {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Posterior over every action in the space given the history snapshot.
    ///
    /// `noise_bound` is the noise estimator's upper bound on reward noise;
    /// it keeps sparsely observed actions at wide variance.
    pub fn posterior(
        &self,
        space: &ActionSpace,
        history: &[RewardPoint],
        noise_bound: f64,
    ) -> Posterior {
        let normalized: Vec<(Vec<f64>, f64)> = history
            .iter()
            .map(|p| (space.normalize(&p.values), p.reward))
            .collect();

        let (mean, variance): (Vec<f64>, Vec<f64>) = space
            .actions()
            .par_iter()
            .map(|action| {
                let at = space.normalize(&action.values);
                self.point_posterior(&at, &normalized, noise_bound)
            })
            .unzip();

        Posterior { mean, variance }
    }

    fn point_posterior(
        &self,
        at: &[f64],
        history: &[(Vec<f64>, f64)],
        noise_bound: f64,
    ) -> (f64, f64) {
        let h2 = self.config.bandwidth * self.config.bandwidth;

        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        let weights: Vec<f64> = history
            .iter()
            .map(|(coords, reward)| {
                let d2: f64 = at
                    .iter()
                    .zip(coords)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let w = (-d2 / (2.0 * h2)).exp();
                total_weight += w;
                weighted_sum += w * reward;
                w
            })
            .collect();

        if total_weight < MIN_TOTAL_WEIGHT {
            debug!(
                total_weight,
                "kernel mass numerically zero, using prior posterior"
            );
            return (self.config.prior_mean, self.config.prior_variance);
        }

        let mean = weighted_sum / total_weight;
        let dispersion: f64 = weights
            .iter()
            .zip(history)
            .map(|(w, (_, reward))| w * (reward - mean) * (reward - mean))
            .sum::<f64>()
            / total_weight;
        let variance = (noise_bound * noise_bound + dispersion) / total_weight;

        (mean, variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_types::{Parameter, Resolution};

    fn unit_space(points: usize) -> ActionSpace {
        ActionSpace::build(vec![Parameter::new(
            "x",
            "",
            0.0,
            1.0,
            Resolution::Count(points),
        )])
        .unwrap()
    }

    fn regressor() -> KernelRegressor {
        KernelRegressor::new(KernelConfig::new(0.2, 0.0, 1.0))
    }

    #[test]
    fn empty_history_returns_prior_everywhere() {
        let space = unit_space(5);
        let posterior = regressor().posterior(&space, &[], 0.1);
        assert_eq!(posterior.mean, vec![0.0; 5]);
        assert_eq!(posterior.variance, vec![1.0; 5]);
    }

    #[test]
    fn observed_action_mean_matches_single_reward() {
        let space = unit_space(5);
        let history = vec![RewardPoint::new(vec![0.5], 0.8)];
        let posterior = regressor().posterior(&space, &history, 0.1);
        // index 2 is x = 0.5; a single observation dominates its own mean
        assert!((posterior.mean[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let space = unit_space(9);
        let history = vec![
            RewardPoint::new(vec![0.0], 0.3),
            RewardPoint::new(vec![0.5], 0.9),
            RewardPoint::new(vec![1.0], 0.4),
        ];
        let a = regressor().posterior(&space, &history, 0.1);
        let b = regressor().posterior(&space, &history, 0.1);
        assert_eq!(a, b);
    }

    #[test]
    fn variance_shrinks_with_repeated_observations() {
        let space = unit_space(5);
        let reg = regressor();
        let one = vec![RewardPoint::new(vec![0.5], 0.8)];
        let three = vec![
            RewardPoint::new(vec![0.5], 0.8),
            RewardPoint::new(vec![0.5], 0.8),
            RewardPoint::new(vec![0.5], 0.8),
        ];
        let v1 = reg.posterior(&space, &one, 0.1).variance[2];
        let v3 = reg.posterior(&space, &three, 0.1).variance[2];
        assert!(v3 < v1);
    }

    #[test]
    fn tiny_bandwidth_far_from_data_falls_back_to_prior() {
        let space = unit_space(11);
        let reg = KernelRegressor::new(KernelConfig::new(1e-3, 0.25, 2.0));
        let history = vec![RewardPoint::new(vec![0.0], 0.9)];
        let posterior = reg.posterior(&space, &history, 0.1);
        // far end of the grid has no kernel mass at this bandwidth
        assert_eq!(posterior.mean[10], 0.25);
        assert_eq!(posterior.variance[10], 2.0);
    }

    #[test]
    fn mean_interpolates_between_neighbours() {
        let space = unit_space(3);
        let history = vec![
            RewardPoint::new(vec![0.0], 0.0),
            RewardPoint::new(vec![1.0], 1.0),
        ];
        let posterior = regressor().posterior(&space, &history, 0.1);
        // midpoint is equidistant from both observations
        assert!((posterior.mean[1] - 0.5).abs() < 1e-12);
    }
}
