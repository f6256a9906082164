//! Reward noise bound estimation.

use tracing::debug;

use crate::kernel::RewardPoint;
use sc_types::NoiseMode;

/// Produces the per-round upper bound on reward noise standard deviation.
///
/// Stateless per call: `Estimated` recomputes from the history snapshot it is
/// given and owns nothing mutable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseEstimator {
    Configured { bound: f64 },
    Estimated { fallback: f64 },
}

impl From<NoiseMode> for NoiseEstimator {
    fn from(mode: NoiseMode) -> Self {
        match mode {
            NoiseMode::Configured { bound } => Self::Configured { bound },
            NoiseMode::Estimated { fallback } => Self::Estimated { fallback },
        }
    }
}

impl NoiseEstimator {
    /// The noise bound for the given history snapshot.
    pub fn bound(&self, history: &[RewardPoint]) -> f64 {
        match *self {
            Self::Configured { bound } => bound,
            Self::Estimated { fallback } => match pooled_std(history) {
                Some(std) if std.is_finite() && std > 0.0 => std,
                _ => {
                    debug!(fallback, "too few repeated samples, using fallback noise bound");
                    fallback
                }
            },
        }
    }
}

/// Pooled sample standard deviation over groups of identical actions.
/// Returns `None` when no action has been measured at least twice.
fn pooled_std(history: &[RewardPoint]) -> Option<f64> {
    let mut groups: Vec<(&[f64], Vec<f64>)> = Vec::new();
    for point in history {
        match groups.iter_mut().find(|(coords, _)| *coords == point.values) {
            Some((_, rewards)) => rewards.push(point.reward),
            None => groups.push((&point.values, vec![point.reward])),
        }
    }

    let mut sum_sq = 0.0;
    let mut dof = 0usize;
    for (_, rewards) in &groups {
        if rewards.len() < 2 {
            continue;
        }
        let mean = rewards.iter().sum::<f64>() / rewards.len() as f64;
        sum_sq += rewards.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>();
        dof += rewards.len() - 1;
    }

    if dof == 0 {
        None
    } else {
        Some((sum_sq / dof as f64).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_ignores_history() {
        let est = NoiseEstimator::Configured { bound: 0.3 };
        assert_eq!(est.bound(&[]), 0.3);
        assert_eq!(est.bound(&[RewardPoint::new(vec![1.0], 5.0)]), 0.3);
    }

    #[test]
    fn estimated_falls_back_without_repeats() {
        let est = NoiseEstimator::Estimated { fallback: 0.5 };
        let history = vec![
            RewardPoint::new(vec![0.0], 0.1),
            RewardPoint::new(vec![1.0], 0.9),
        ];
        assert_eq!(est.bound(&history), 0.5);
    }

    #[test]
    fn estimated_uses_repeated_action_spread() {
        let est = NoiseEstimator::Estimated { fallback: 0.5 };
        let history = vec![
            RewardPoint::new(vec![0.5], 0.7),
            RewardPoint::new(vec![0.5], 0.9),
            RewardPoint::new(vec![1.0], 0.2),
        ];
        // sample std of {0.7, 0.9} is sqrt(0.02)
        let expected = (0.02f64).sqrt();
        assert!((est.bound(&history) - expected).abs() < 1e-12);
    }

    #[test]
    fn identical_repeats_fall_back_to_default() {
        // zero spread would collapse the posterior; the fallback keeps the
        // regression regularized
        let est = NoiseEstimator::Estimated { fallback: 0.5 };
        let history = vec![
            RewardPoint::new(vec![0.5], 0.7),
            RewardPoint::new(vec![0.5], 0.7),
        ];
        assert_eq!(est.bound(&history), 0.5);
    }
}
