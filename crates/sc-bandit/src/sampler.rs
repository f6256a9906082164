//! Thompson sampling over the posterior grid.
//!
//! This is the only place randomness enters action selection. The random
//! source is injected so a session (or a test) can pin a seed and get the
//! same draw for the same posterior.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::kernel::Posterior;
use sc_types::Polarity;

/// Draws one value per action from `N(mean, sqrt(variance))` and picks the
/// best according to polarity. Ties break to the first action in enumeration
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThompsonSampler;

impl ThompsonSampler {
    /// Index of the selected action. The posterior must be non-empty.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        posterior: &Posterior,
        polarity: Polarity,
        rng: &mut R,
    ) -> usize {
        debug_assert!(!posterior.is_empty());

        let mut best_index = 0;
        let mut best_sample = f64::NAN;
        for (index, (&mean, &variance)) in posterior
            .mean
            .iter()
            .zip(&posterior.variance)
            .enumerate()
        {
            let std = variance.max(0.0).sqrt();
            let sample = if std > 0.0 {
                Normal::new(mean, std)
                    .map(|normal| normal.sample(rng))
                    .unwrap_or(mean)
            } else {
                mean
            };

            let better = match polarity {
                Polarity::Maximize => sample > best_sample,
                Polarity::Minimize => sample < best_sample,
            };
            if index == 0 || better {
                best_index = index;
                best_sample = sample;
            }
        }
        best_index
    }
}
