//! The round-based optimization session state machine.
//!
//! One round: sample an action from the posterior, hand it to the measurement
//! capability, combine the scores into a reward, update the model input and
//! the on-disk records. Rounds are strictly sequential; each sampling decision
//! depends on the posterior updated with all prior rounds.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use sc_bandit::{KernelConfig, KernelTs, NoiseEstimator, Posterior, PseudoActions, RewardPoint};
use sc_rating::RatingService;
use sc_store::{load_previous, SessionManifest, SessionStore};
use sc_types::{
    Action, ActionSpace, Measurement, MeasureError, Observation, Polarity, RewardRecord, ScError,
    ScResult, SessionConfig, StoreError,
};

use crate::combine::RewardCombiner;
use crate::measure::Acquisition;

/// Lifecycle state of an optimization session. `Stopped` and `Aborted` are
/// terminal; an aborted session keeps all history recorded before the
/// failing round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Initializing,
    Ready,
    Sampling,
    Measuring,
    Updating,
    Stopped,
    Aborted,
}

/// Cooperative stop signal; clone it out of the session and trip it from an
/// operator-facing front-end.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal summary of a session run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub state: SessionState,
    /// Rounds measured by this session (imported rounds excluded).
    pub rounds_completed: usize,
    /// Total history length, imports included. For an aborted session this is
    /// the index of the last successful round.
    pub last_round: usize,
    pub best: Option<RewardRecord>,
    pub error: Option<String>,
}

/// A running optimization session. Owns the action space, the model, the
/// history, and the record store; no other component holds a writable
/// reference to any of them.
pub struct OptimizationSession<A: Acquisition> {
    config: SessionConfig,
    space: ActionSpace,
    model: KernelTs,
    combiner: RewardCombiner,
    acquisition: A,
    store: SessionStore,
    observations: Vec<Observation>,
    rewards: Vec<RewardRecord>,
    best: Option<RewardRecord>,
    rng: ChaCha8Rng,
    state: SessionState,
    stop: StopHandle,
    imported: usize,
    native_rounds: usize,
}

impl<A: Acquisition> OptimizationSession<A> {
    /// Validate the configuration, build the action space, create the record
    /// store, and merge any warm-start histories. Fails synchronously before
    /// any measurement is taken.
    pub fn initialize(
        mut config: SessionConfig,
        acquisition: A,
        service: Option<Arc<dyn RatingService>>,
    ) -> ScResult<Self> {
        info!(name = %config.name, "initializing optimization session");
        config.validate().map_err(ScError::Config)?;

        if config.with_time && config.objectives.len() > 2 {
            warn!("disabling time objective: more than two objectives are enabled");
            config.with_time = false;
        }

        let space = ActionSpace::build(config.parameters.clone()).map_err(ScError::Config)?;
        let bandwidth = config
            .bandwidth
            .unwrap_or_else(|| KernelConfig::rule_of_thumb(space.dims()));
        let model = KernelTs::new(
            KernelConfig::new(bandwidth, config.prior_mean, config.prior_variance),
            NoiseEstimator::from(config.noise),
            config.pseudo_points.then(|| PseudoActions::new(&space)),
        );
        let combiner = RewardCombiner::new(&config, service).map_err(ScError::Config)?;

        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(&config.output_dir, &manifest)?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut session = Self {
            config,
            space,
            model,
            combiner,
            acquisition,
            store,
            observations: Vec::new(),
            rewards: Vec::new(),
            best: None,
            rng,
            state: SessionState::Initializing,
            stop: StopHandle::default(),
            imported: 0,
            native_rounds: 0,
        };
        session.import_previous()?;
        session.state = SessionState::Ready;
        info!(
            actions = session.space.len(),
            imported = session.imported,
            "session ready"
        );
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.space
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn rewards(&self) -> &[RewardRecord] {
        &self.rewards
    }

    pub fn best(&self) -> Option<&RewardRecord> {
        self.best.as_ref()
    }

    pub fn model(&self) -> &KernelTs {
        &self.model
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The regression input history in physical coordinates.
    pub fn history_points(&self) -> Vec<RewardPoint> {
        self.rewards
            .iter()
            .map(|r| RewardPoint::new(r.action.values.clone(), r.reward))
            .collect()
    }

    /// Current posterior over the whole action space, for inspection and
    /// regression plots.
    pub fn posterior(&self) -> Posterior {
        self.model.posterior(&self.space, &self.history_points()).0
    }

    /// Run rounds until the stop handle fires, the round budget is exhausted,
    /// or a round fails unrecoverably. Returns the terminal report; an
    /// aborted session keeps all history recorded before the failing round.
    pub async fn run(&mut self) -> ScResult<SessionReport> {
        loop {
            if self.stop.is_stopped() {
                info!("stop requested, ending session");
                self.state = SessionState::Stopped;
                break;
            }
            if let Some(budget) = self.config.max_rounds {
                if self.native_rounds >= budget {
                    info!(budget, "round budget exhausted");
                    self.state = SessionState::Stopped;
                    break;
                }
            }
            if let Err(err) = self.step().await {
                self.state = SessionState::Aborted;
                warn!(
                    %err,
                    last_round = self.observations.len(),
                    "session aborted"
                );
                return Ok(self.report(Some(err.to_string())));
            }
        }
        Ok(self.report(None))
    }

    /// One full round: `Ready → Sampling → Measuring → Updating → Ready`.
    async fn step(&mut self) -> ScResult<()> {
        self.state = SessionState::Sampling;
        let history = self.history_points();
        let (index, noise_bound) = self.model.sample(
            &self.space,
            &history,
            self.combiner.polarity(),
            &mut self.rng,
        );
        let action = self.space.action(index).clone();
        debug!(round = self.observations.len(), action = ?action.values, "sampled next action");

        self.state = SessionState::Measuring;
        let (mut measurement, scores) = match self.measure_once(&action).await {
            Ok(result) => result,
            Err(first) => {
                warn!(%first, "measurement failed, retrying round once");
                match self.measure_once(&action).await {
                    Ok(result) => result,
                    Err(second) => return Err(second.into()),
                }
            }
        };

        self.state = SessionState::Updating;
        let round = self.observations.len();
        let (reward, degraded) = match self.combiner.combine(&scores, measurement.elapsed_s).await
        {
            Ok(reward) => (reward, false),
            Err(err) => {
                warn!(%err, "rating service failed, weighted fallback for this round");
                (
                    self.combiner.fallback(&scores, measurement.elapsed_s),
                    true,
                )
            }
        };

        if self.config.thrash_data {
            measurement.artifact = None;
        } else if let Some(artifact) = &measurement.artifact {
            self.store.append_artifact(round, artifact)?;
        }

        let observation = Observation {
            round,
            action: action.clone(),
            scores,
            elapsed_s: measurement.elapsed_s,
            thrashed: self.config.thrash_data,
            timestamp: Utc::now(),
        };
        let record = RewardRecord {
            round,
            action,
            reward,
            noise_bound,
            degraded,
        };

        self.store.append_observation(&observation)?;
        self.store.append_reward(&record)?;
        self.update_best(&record);
        self.observations.push(observation);
        self.rewards.push(record);
        self.native_rounds += 1;
        info!(round, reward, degraded, "round recorded");

        self.state = SessionState::Ready;
        Ok(())
    }

    /// One guarded measurement attempt, including score extraction in the
    /// session's objective order.
    async fn measure_once(
        &mut self,
        action: &Action,
    ) -> Result<(Measurement, Vec<f64>), MeasureError> {
        let timeout_s = self.config.measure_timeout_s;
        let measurement = match timeout(
            Duration::from_secs_f64(timeout_s),
            self.acquisition.measure(action),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(MeasureError::Timeout { timeout_s }),
        };

        let mut scores = Vec::with_capacity(self.config.objectives.len());
        for obj in &self.config.objectives {
            match measurement.scores.get(obj.label()) {
                Some(score) if score.is_finite() => scores.push(*score),
                _ => {
                    return Err(MeasureError::MissingScore {
                        label: obj.label().to_string(),
                    })
                }
            }
        }
        Ok((measurement, scores))
    }

    /// Merge previous sessions' records. Prior actions outside the current
    /// bounds are discarded with a warning; a mismatched parameter or
    /// objective set is a fatal configuration problem.
    fn import_previous(&mut self) -> ScResult<()> {
        for path in self.config.previous.clone() {
            let previous = load_previous(&path)?;
            self.check_compatible(&path, &previous.manifest)?;

            let mut kept = 0usize;
            let mut dropped = 0usize;
            for mut obs in previous.observations {
                if obs.thrashed && !self.config.import_thrashed {
                    dropped += 1;
                    continue;
                }
                if !self.space.contains(&obs.action.values) {
                    warn!(
                        path = %path.display(),
                        round = obs.round,
                        action = ?obs.action.values,
                        "previous action outside current bounds, discarding"
                    );
                    dropped += 1;
                    continue;
                }

                let round = self.observations.len();
                let reward = self.combiner.combine_local(&obs.scores, obs.elapsed_s);
                let noise_bound = self.model.noise_bound(&self.history_points());
                let record = RewardRecord {
                    round,
                    action: obs.action.clone(),
                    reward,
                    noise_bound,
                    degraded: false,
                };
                obs.round = round;
                self.update_best(&record);
                self.observations.push(obs);
                self.rewards.push(record);
                kept += 1;
            }
            info!(path = %path.display(), kept, dropped, "imported previous session");
        }
        self.imported = self.observations.len();
        Ok(())
    }

    fn check_compatible(&self, path: &Path, manifest: &SessionManifest) -> Result<(), StoreError> {
        let current_params: Vec<&str> =
            self.config.parameters.iter().map(|p| p.name.as_str()).collect();
        let previous_params: Vec<&str> =
            manifest.parameters.iter().map(|p| p.name.as_str()).collect();
        if current_params != previous_params {
            return Err(StoreError::IncompatibleHistory {
                path: path.display().to_string(),
                reason: format!(
                    "parameter set {previous_params:?} does not match current {current_params:?}"
                ),
            });
        }

        let current_objectives: Vec<&str> =
            self.config.objectives.iter().map(|o| o.label()).collect();
        let previous_objectives: Vec<&str> =
            manifest.objectives.iter().map(|o| o.as_str()).collect();
        if current_objectives != previous_objectives {
            return Err(StoreError::IncompatibleHistory {
                path: path.display().to_string(),
                reason: format!(
                    "objective set {previous_objectives:?} does not match current {current_objectives:?}"
                ),
            });
        }
        Ok(())
    }

    fn update_best(&mut self, record: &RewardRecord) {
        let better = match &self.best {
            None => true,
            Some(current) => match self.combiner.polarity() {
                Polarity::Maximize => record.reward > current.reward,
                Polarity::Minimize => record.reward < current.reward,
            },
        };
        if better {
            self.best = Some(record.clone());
        }
    }

    fn report(&self, error: Option<String>) -> SessionReport {
        SessionReport {
            state: self.state,
            rounds_completed: self.native_rounds,
            last_round: self.observations.len(),
            best: self.best.clone(),
            error,
        }
    }
}
