//! Result capture: one directory per run under `results/<scenario>/<run_id>/`.
//!
//! A run directory holds `verdict.json`, `meta.json` and the agent's
//! per-turn `trace/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::verdict::{RunVerdict, VerdictStatus};

pub const VERDICT_FILE: &str = "verdict.json";
pub const META_FILE: &str = "meta.json";
pub const TRACE_DIR: &str = "trace";

/// Input for capturing a finished run.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub scenario: &'a str,
    pub run_id: &'a str,
    pub model: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub verdict: &'a RunVerdict,
}

/// Run metadata, persisted to `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub scenario: String,
    pub run_id: String,
    pub model: String,
    pub status: VerdictStatus,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
}

/// `run-<timestamp>_<suffix>`, unique enough for repeated local runs.
pub fn new_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("run-{timestamp}_{}", short_suffix())
}

fn short_suffix() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

pub fn results_dir(base_dir: &Path, scenario: &str, run_id: &str) -> PathBuf {
    base_dir.join(scenario).join(run_id)
}

/// Write `verdict.json` and `meta.json` for a finished run.
#[instrument(skip_all, fields(scenario = %input.scenario, run_id = %input.run_id))]
pub fn capture_run(base_dir: &Path, input: &CaptureInput<'_>) -> Result<PathBuf> {
    let dir = results_dir(base_dir, input.scenario, input.run_id);
    fs::create_dir_all(&dir).with_context(|| format!("create results dir {}", dir.display()))?;

    let duration = input.finished_at - input.started_at;
    let meta = RunMeta {
        scenario: input.scenario.to_string(),
        run_id: input.run_id.to_string(),
        model: input.model.to_string(),
        status: input.verdict.status,
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
    };
    write_json(&dir.join(VERDICT_FILE), input.verdict)?;
    write_json(&dir.join(META_FILE), &meta)?;
    debug!(results_dir = %dir.display(), "run captured");
    Ok(dir)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, format!("{contents}\n")).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::verdict::VerdictData;

    #[test]
    fn results_dir_is_stable() {
        let dir = results_dir(Path::new("/tmp/results"), "seed_01_syntax", "run-1");
        assert_eq!(dir, PathBuf::from("/tmp/results/seed_01_syntax/run-1"));
    }

    #[test]
    fn run_ids_are_prefixed_and_distinct() {
        let first = new_run_id();
        let second = new_run_id();
        assert!(first.starts_with("run-"));
        assert_ne!(first, second);
    }

    #[test]
    fn captures_verdict_and_meta() {
        let temp = tempfile::tempdir().expect("tempdir");
        let verdict = RunVerdict::pass(VerdictData {
            scenario: "seed_01_syntax".to_string(),
            turns: Some(2),
            ..VerdictData::default()
        });
        let started_at = Utc::now();
        let input = CaptureInput {
            scenario: "seed_01_syntax",
            run_id: "run-1",
            model: "gpt-4o-mini",
            started_at,
            finished_at: started_at + Duration::milliseconds(2500),
            verdict: &verdict,
        };

        let dir = capture_run(temp.path(), &input).expect("capture");

        let written: RunVerdict = read_json(&dir.join(VERDICT_FILE)).expect("verdict");
        assert_eq!(written, verdict);
        let meta: RunMeta = read_json(&dir.join(META_FILE)).expect("meta");
        assert_eq!(meta.status, VerdictStatus::Pass);
        assert_eq!(meta.duration_secs, 2.5);
    }
}
