//! # sc-store
//!
//! On-disk session records and warm-start import.
//!
//! Each session owns one output folder holding a JSON manifest plus two
//! append-only CSV files, one row per round. Actions are stored as physical
//! parameter values, never grid indices, so a later session built from a
//! different point count can still import the history.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sc_types::{Action, Observation, Parameter, RewardRecord, SessionConfig, SessionId, StoreError};

const MANIFEST_FILE: &str = "session.json";
const OBSERVATIONS_FILE: &str = "observations.csv";
const REWARDS_FILE: &str = "rewards.csv";
const ARTIFACTS_FILE: &str = "artifacts.jsonl";

/// Snapshot of the configuration a record set was written under. Read back
/// at warm start to check compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub id: SessionId,
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Objective labels, in the session's priority order.
    pub objectives: Vec<String>,
    pub with_time: bool,
    pub pseudo_points: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionManifest {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            parameters: config.parameters.clone(),
            objectives: config
                .objectives
                .iter()
                .map(|o| o.label().to_string())
                .collect(),
            with_time: config.with_time,
            pseudo_points: config.pseudo_points,
            created_at: config.created_at,
        }
    }
}

/// A previous session's records, loaded for warm start.
#[derive(Debug, Clone)]
pub struct PreviousSession {
    pub manifest: SessionManifest,
    pub observations: Vec<Observation>,
}

/// Writer for one session's record set.
#[derive(Debug)]
pub struct SessionStore {
    root: PathBuf,
    param_count: usize,
    objective_count: usize,
}

impl SessionStore {
    /// Create the session folder and write the manifest and CSV headers.
    /// Refuses to reuse a folder that already holds a session, so a mistyped
    /// output path cannot overwrite previous results.
    pub fn create(root: impl AsRef<Path>, manifest: &SessionManifest) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(StoreError::SessionExists {
                path: root.display().to_string(),
            });
        }
        std::fs::create_dir_all(&root).map_err(io_error)?;

        let file = File::create(&manifest_path).map_err(io_error)?;
        serde_json::to_writer_pretty(file, manifest).map_err(|e| StoreError::Io {
            message: e.to_string(),
        })?;

        let mut header = vec![
            "round".to_string(),
            "timestamp".to_string(),
            "thrashed".to_string(),
            "elapsed_s".to_string(),
        ];
        header.extend(manifest.parameters.iter().map(|p| p.name.clone()));
        header.extend(manifest.objectives.iter().cloned());
        write_header(&root.join(OBSERVATIONS_FILE), &header)?;

        write_header(
            &root.join(REWARDS_FILE),
            &[
                "round".to_string(),
                "reward".to_string(),
                "noise_bound".to_string(),
                "degraded".to_string(),
            ],
        )?;

        info!(root = %root.display(), "created session store");
        Ok(Self {
            root,
            param_count: manifest.parameters.len(),
            objective_count: manifest.objectives.len(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one observation row. Action coordinates are written as physical
    /// values with round-trip-exact formatting.
    pub fn append_observation(&self, obs: &Observation) -> Result<(), StoreError> {
        debug_assert_eq!(obs.action.values.len(), self.param_count);
        debug_assert_eq!(obs.scores.len(), self.objective_count);

        let mut row = vec![
            obs.round.to_string(),
            obs.timestamp.to_rfc3339(),
            obs.thrashed.to_string(),
            obs.elapsed_s.to_string(),
        ];
        row.extend(obs.action.values.iter().map(|v| v.to_string()));
        row.extend(obs.scores.iter().map(|s| s.to_string()));
        append_row(&self.root.join(OBSERVATIONS_FILE), &row)
    }

    /// Append one reward row.
    pub fn append_reward(&self, rec: &RewardRecord) -> Result<(), StoreError> {
        let row = vec![
            rec.round.to_string(),
            rec.reward.to_string(),
            rec.noise_bound.to_string(),
            rec.degraded.to_string(),
        ];
        append_row(&self.root.join(REWARDS_FILE), &row)
    }

    /// Append one round's raw acquisition artifact. Skipped entirely when the
    /// thrash-data policy is active, so the file only exists for sessions that
    /// keep their artifacts.
    pub fn append_artifact(
        &self,
        round: usize,
        artifact: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let line = serde_json::to_string(&serde_json::json!({
            "round": round,
            "artifact": artifact,
        }))
        .map_err(|e| StoreError::Io {
            message: e.to_string(),
        })?;

        use std::io::Write;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(ARTIFACTS_FILE))
            .map_err(io_error)?;
        writeln!(file, "{line}").map_err(io_error)
    }
}

/// Load a previous session's manifest and observations for warm start.
pub fn load_previous(path: impl AsRef<Path>) -> Result<PreviousSession, StoreError> {
    let path = path.as_ref();
    let manifest_path = path.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(StoreError::ManifestNotFound {
            path: path.display().to_string(),
        });
    }
    let file = File::open(&manifest_path).map_err(io_error)?;
    let manifest: SessionManifest =
        serde_json::from_reader(file).map_err(|e| StoreError::MalformedRecord {
            path: manifest_path.display().to_string(),
            message: e.to_string(),
        })?;

    let obs_path = path.join(OBSERVATIONS_FILE);
    let mut reader = csv::Reader::from_path(&obs_path).map_err(|e| StoreError::Io {
        message: e.to_string(),
    })?;

    let param_count = manifest.parameters.len();
    let objective_count = manifest.objectives.len();
    let expected = 4 + param_count + objective_count;

    let mut observations = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| StoreError::MalformedRecord {
            path: obs_path.display().to_string(),
            message: e.to_string(),
        })?;
        if record.len() != expected {
            return Err(StoreError::MalformedRecord {
                path: obs_path.display().to_string(),
                message: format!("expected {expected} fields, got {}", record.len()),
            });
        }

        let parse_f64 = |s: &str| -> Result<f64, StoreError> {
            s.parse().map_err(|_| StoreError::MalformedRecord {
                path: obs_path.display().to_string(),
                message: format!("not a number: {s}"),
            })
        };

        let round: usize = record[0].parse().map_err(|_| StoreError::MalformedRecord {
            path: obs_path.display().to_string(),
            message: format!("bad round index: {}", &record[0]),
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&record[1])
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::MalformedRecord {
                path: obs_path.display().to_string(),
                message: e.to_string(),
            })?;
        let thrashed = &record[2] == "true";
        let elapsed_s = parse_f64(&record[3])?;

        let mut values = Vec::with_capacity(param_count);
        for i in 0..param_count {
            values.push(parse_f64(&record[4 + i])?);
        }
        let mut scores = Vec::with_capacity(objective_count);
        for i in 0..objective_count {
            scores.push(parse_f64(&record[4 + param_count + i])?);
        }

        observations.push(Observation {
            round,
            action: Action::new(values),
            scores,
            elapsed_s,
            thrashed,
            timestamp,
        });
    }

    debug!(
        path = %path.display(),
        count = observations.len(),
        "loaded previous session records"
    );
    Ok(PreviousSession {
        manifest,
        observations,
    })
}

fn write_header(path: &Path, header: &[String]) -> Result<(), StoreError> {
    let file = File::create(path).map_err(io_error)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header).map_err(|e| StoreError::Io {
        message: e.to_string(),
    })?;
    writer.flush().map_err(io_error)
}

fn append_row(path: &Path, row: &[String]) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(io_error)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(row).map_err(|e| StoreError::Io {
        message: e.to_string(),
    })?;
    writer.flush().map_err(io_error)
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::Io {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_types::{ObjectiveKind, ObjectiveSpec, Resolution};

    fn sample_config(dir: &Path) -> SessionConfig {
        SessionConfig::new(
            "store_test",
            vec![
                Parameter::new("Dwelltime", "s", 1e-5, 1e-4, Resolution::Count(10)),
                Parameter::new("Exc/Power", "mW", 0.0, 10.0, Resolution::Count(5)),
            ],
            vec![
                ObjectiveSpec::new(ObjectiveKind::Quality, 1.0),
                ObjectiveSpec::new(ObjectiveKind::Bleach, 0.2),
            ],
            dir,
        )
    }

    fn sample_observation(round: usize) -> Observation {
        Observation {
            round,
            action: Action::new(vec![2.5e-5, 7.5]),
            scores: vec![0.8, 0.05],
            elapsed_s: 1.25,
            thrashed: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn roundtrip_observations_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(dir.path().join("run"), &manifest).unwrap();

        store.append_observation(&sample_observation(0)).unwrap();
        store.append_observation(&sample_observation(1)).unwrap();

        let previous = load_previous(store.root()).unwrap();
        assert_eq!(previous.manifest.name, "store_test");
        assert_eq!(previous.observations.len(), 2);
        assert_eq!(previous.observations[0].action.values, vec![2.5e-5, 7.5]);
        assert_eq!(previous.observations[0].scores, vec![0.8, 0.05]);
        assert_eq!(previous.observations[1].round, 1);
    }

    #[test]
    fn physical_values_survive_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(dir.path().join("run"), &manifest).unwrap();

        let mut obs = sample_observation(0);
        obs.action = Action::new(vec![1e-5 + (1e-4 - 1e-5) * 3.0 / 9.0, 2.5]);
        store.append_observation(&obs).unwrap();

        let previous = load_previous(store.root()).unwrap();
        assert_eq!(previous.observations[0].action, obs.action);
    }

    #[test]
    fn refuses_to_overwrite_existing_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let root = dir.path().join("run");

        SessionStore::create(&root, &manifest).unwrap();
        assert!(matches!(
            SessionStore::create(&root, &manifest),
            Err(StoreError::SessionExists { .. })
        ));
    }

    #[test]
    fn rewards_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(dir.path().join("run"), &manifest).unwrap();

        store
            .append_reward(&RewardRecord {
                round: 0,
                action: Action::new(vec![2.5e-5, 7.5]),
                reward: 0.8,
                noise_bound: 1.0,
                degraded: true,
            })
            .unwrap();

        let contents = std::fs::read_to_string(store.root().join("rewards.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "round,reward,noise_bound,degraded");
        assert_eq!(lines.next().unwrap(), "0,0.8,1,true");
    }

    #[test]
    fn artifacts_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(dir.path().join("run"), &manifest).unwrap();

        store
            .append_artifact(0, &serde_json::json!({"stack": "STED/0.tiff"}))
            .unwrap();
        store
            .append_artifact(1, &serde_json::json!({"stack": "STED/1.tiff"}))
            .unwrap();

        let contents = std::fs::read_to_string(store.root().join("artifacts.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["round"], 0);
        assert_eq!(first["artifact"]["stack"], "STED/0.tiff");
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_previous(dir.path()),
            Err(StoreError::ManifestNotFound { .. })
        ));
    }

    #[test]
    fn thrashed_flag_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let manifest = SessionManifest::from_config(&config);
        let store = SessionStore::create(dir.path().join("run"), &manifest).unwrap();

        let mut obs = sample_observation(0);
        obs.thrashed = true;
        store.append_observation(&obs).unwrap();

        let previous = load_previous(store.root()).unwrap();
        assert!(previous.observations[0].thrashed);
    }
}
