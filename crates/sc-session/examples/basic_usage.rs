//! Run a short optimization session against a simulated instrument.
//!
//! The simulated quality response is a smooth bump over dwelltime, so the
//! sampler should concentrate near the peak after a handful of rounds.

use std::collections::HashMap;

use async_trait::async_trait;

use sc_session::{Acquisition, OptimizationSession};
use sc_types::{
    Action, Measurement, MeasureError, ObjectiveKind, ObjectiveSpec, Parameter, Resolution,
    SessionConfig,
};

struct SimulatedScope;

#[async_trait]
impl Acquisition for SimulatedScope {
    async fn measure(&mut self, action: &Action) -> Result<Measurement, MeasureError> {
        let dwelltime = action.values[0];
        // quality peaks at 40 us dwelltime
        let z = (dwelltime - 4e-5) / 2e-5;
        let quality = (-z * z).exp();

        let mut scores = HashMap::new();
        scores.insert("Quality".to_string(), quality);
        Ok(Measurement::new(scores, dwelltime * 512.0 * 512.0))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let output = std::env::temp_dir().join(format!("sc-basic-usage-{}", std::process::id()));
    let config = SessionConfig::new(
        "basic_usage",
        vec![Parameter::new(
            "Dwelltime",
            "s",
            1e-5,
            1e-4,
            Resolution::Count(20),
        )],
        vec![ObjectiveSpec::new(ObjectiveKind::Quality, 1.0)],
        &output,
    )
    .with_seed(7)
    .with_max_rounds(15)
    .with_pseudo_points(true);

    let mut session = OptimizationSession::initialize(config, SimulatedScope, None)?;
    let report = session.run().await?;

    println!("state:  {:?}", report.state);
    println!("rounds: {}", report.rounds_completed);
    if let Some(best) = report.best {
        println!(
            "best:   dwelltime {:.2e} s -> reward {:.3}",
            best.action.values[0], best.reward
        );
    }
    println!("records in {}", output.display());
    Ok(())
}
