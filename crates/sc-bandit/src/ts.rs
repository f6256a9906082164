//! Kernel Thompson Sampling policy: noise bound → (optionally augmented)
//! kernel posterior → one posterior draw.

use rand::Rng;

use crate::kernel::{KernelConfig, KernelRegressor, Posterior, RewardPoint};
use crate::noise::NoiseEstimator;
use crate::pseudo::PseudoActions;
use crate::sampler::ThompsonSampler;
use sc_types::{ActionSpace, Polarity};

/// One Kernel-TS model instance. The model owns no history: every call is a
/// pure function of the snapshot passed in, which the session owns.
#[derive(Debug, Clone)]
pub struct KernelTs {
    regressor: KernelRegressor,
    noise: NoiseEstimator,
    pseudo: Option<PseudoActions>,
    sampler: ThompsonSampler,
}

impl KernelTs {
    pub fn new(config: KernelConfig, noise: NoiseEstimator, pseudo: Option<PseudoActions>) -> Self {
        Self {
            regressor: KernelRegressor::new(config),
            noise,
            pseudo,
            sampler: ThompsonSampler,
        }
    }

    /// The noise bound the estimator reports for this history snapshot.
    pub fn noise_bound(&self, history: &[RewardPoint]) -> f64 {
        self.noise.bound(history)
    }

    /// The points actually fed to the regressor: the real history plus any
    /// boundary mirrors. Pseudo points never leave this method's return value.
    pub fn regression_input(&self, history: &[RewardPoint]) -> Vec<RewardPoint> {
        match &self.pseudo {
            Some(pseudo) => pseudo.augment(history),
            None => history.to_vec(),
        }
    }

    /// Posterior over the space plus the noise bound that produced it.
    pub fn posterior(&self, space: &ActionSpace, history: &[RewardPoint]) -> (Posterior, f64) {
        let noise_bound = self.noise.bound(history);
        let input = self.regression_input(history);
        let posterior = self.regressor.posterior(space, &input, noise_bound);
        (posterior, noise_bound)
    }

    /// One Thompson draw: the selected action index and the noise bound used.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        space: &ActionSpace,
        history: &[RewardPoint],
        polarity: Polarity,
        rng: &mut R,
    ) -> (usize, f64) {
        let (posterior, noise_bound) = self.posterior(space, history);
        let index = self.sampler.draw(&posterior, polarity, rng);
        (index, noise_bound)
    }
}
