//! End-to-end session run against a deterministic simulated instrument,
//! followed by a warm start that picks the history back up from disk.

use std::collections::HashMap;

use async_trait::async_trait;

use sc_session::{Acquisition, OptimizationSession, SessionState};
use sc_types::{
    Action, Measurement, MeasureError, NoiseMode, ObjectiveKind, ObjectiveSpec, Parameter,
    Resolution, SessionConfig,
};

struct BumpScope;

#[async_trait]
impl Acquisition for BumpScope {
    async fn measure(&mut self, action: &Action) -> Result<Measurement, MeasureError> {
        let dwelltime = action.values[0];
        let z = (dwelltime - 5.5e-5) / 2e-5;
        let mut scores = HashMap::new();
        scores.insert("Quality".to_string(), (-z * z).exp());
        Ok(Measurement::new(scores, 0.5))
    }
}

fn config(dir: &std::path::Path, name: &str) -> SessionConfig {
    SessionConfig::new(
        name,
        vec![Parameter::new(
            "Dwelltime",
            "s",
            1e-5,
            1e-4,
            Resolution::Count(10),
        )],
        vec![ObjectiveSpec::new(ObjectiveKind::Quality, 1.0)],
        dir.join(name),
    )
    .with_seed(21)
    .with_noise(NoiseMode::Estimated { fallback: 0.1 })
}

#[tokio::test]
async fn ten_rounds_then_warm_start() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = OptimizationSession::initialize(
        config(dir.path(), "first").with_max_rounds(10),
        BumpScope,
        None,
    )
    .unwrap();
    let report = first.run().await.unwrap();

    assert_eq!(report.state, SessionState::Stopped);
    assert_eq!(report.rounds_completed, 10);
    assert_eq!(report.last_round, 10);
    let best = report.best.expect("ten rounds must produce a best record");
    assert!(best.reward > 0.0 && best.reward <= 1.0);

    // records landed on disk: header plus one row per round
    let observations =
        std::fs::read_to_string(dir.path().join("first").join("observations.csv")).unwrap();
    assert_eq!(observations.lines().count(), 11);
    let rewards = std::fs::read_to_string(dir.path().join("first").join("rewards.csv")).unwrap();
    assert_eq!(rewards.lines().count(), 11);

    // a second session resumes from the first one's records and keeps going
    let mut resumed_config = config(dir.path(), "resumed").with_max_rounds(2);
    resumed_config.previous = vec![dir.path().join("first")];
    let mut resumed = OptimizationSession::initialize(resumed_config, BumpScope, None).unwrap();
    assert_eq!(resumed.observations().len(), 10);

    let report = resumed.run().await.unwrap();
    assert_eq!(report.state, SessionState::Stopped);
    assert_eq!(report.rounds_completed, 2);
    assert_eq!(report.last_round, 12);

    // only the two native rounds are persisted by the new session
    let resumed_rows =
        std::fs::read_to_string(dir.path().join("resumed").join("observations.csv")).unwrap();
    assert_eq!(resumed_rows.lines().count(), 3);
}
