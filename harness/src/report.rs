use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::results::{META_FILE, RunMeta, VERDICT_FILE, read_json};
use crate::verdict::{RunVerdict, VerdictStatus};

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconsistent: usize,
    pub avg_turns: Option<f64>,
    pub avg_duration_secs: Option<f64>,
    /// Count of runs per agent stop label.
    pub agent_results: BTreeMap<String, usize>,
}

impl ReportSummary {
    pub fn pass_rate(&self) -> Option<f64> {
        (self.runs > 0).then(|| self.passed as f64 / self.runs as f64)
    }
}

pub fn load_run_dirs(scenario_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !scenario_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(scenario_results_dir)
        .with_context(|| format!("read {}", scenario_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Summarize every run of one scenario. Unreadable runs become warnings.
pub fn aggregate(scenario_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut turns_total = 0u64;
    let mut turns_runs = 0u64;
    let mut duration_total = 0.0;

    for run_dir in load_run_dirs(scenario_results_dir)? {
        let verdict: RunVerdict = match read_json(&run_dir.join(VERDICT_FILE)) {
            Ok(verdict) => verdict,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: {VERDICT_FILE} invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };
        let meta: RunMeta = match read_json(&run_dir.join(META_FILE)) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: {META_FILE} invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        match verdict.status {
            VerdictStatus::Pass => summary.passed += 1,
            VerdictStatus::Fail => summary.failed += 1,
        }
        if verdict.data.inconsistent {
            summary.inconsistent += 1;
        }
        if let Some(turns) = verdict.data.turns {
            turns_total += u64::from(turns);
            turns_runs += 1;
        }
        let label = verdict
            .data
            .agent_result
            .unwrap_or_else(|| "not_started".to_string());
        *summary.agent_results.entry(label).or_insert(0) += 1;
        duration_total += meta.duration_secs;
    }

    if turns_runs > 0 {
        summary.avg_turns = Some(turns_total as f64 / turns_runs as f64);
    }
    if summary.runs > 0 {
        summary.avg_duration_secs = Some(duration_total / summary.runs as f64);
    }
    Ok((summary, warnings))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::results::{CaptureInput, capture_run};
    use crate::verdict::VerdictData;

    fn capture(base: &Path, run_id: &str, verdict: &RunVerdict, secs: i64) {
        let started_at = Utc::now();
        let input = CaptureInput {
            scenario: "seed_01_syntax",
            run_id,
            model: "gpt-4o-mini",
            started_at,
            finished_at: started_at + Duration::seconds(secs),
            verdict,
        };
        capture_run(base, &input).expect("capture");
    }

    fn data(result: &str, turns: u32) -> VerdictData {
        VerdictData {
            scenario: "seed_01_syntax".to_string(),
            agent_result: Some(result.to_string()),
            turns: Some(turns),
            ..VerdictData::default()
        }
    }

    #[test]
    fn aggregates_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let verdict = RunVerdict::pass(data("success", 2));
        capture(temp.path(), "run-1", &verdict, 4);
        let mut inconsistent = data("success", 1);
        inconsistent.inconsistent = true;
        let message = "Agent result: success, CI status: pass, Final CI: fail";
        let verdict = RunVerdict::fail(inconsistent, message);
        capture(temp.path(), "run-2", &verdict, 8);
        capture(
            temp.path(),
            "run-3",
            &RunVerdict::fail(data("exhausted", 3), "Agent result: exhausted"),
            6,
        );

        let (summary, warnings) =
            aggregate(&temp.path().join("seed_01_syntax")).expect("aggregate");

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.inconsistent, 1);
        assert_eq!(summary.avg_turns, Some(2.0));
        assert_eq!(summary.avg_duration_secs, Some(6.0));
        assert_eq!(summary.agent_results.get("success"), Some(&2));
        assert_eq!(summary.agent_results.get("exhausted"), Some(&1));
    }

    #[test]
    fn broken_runs_become_warnings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let broken = temp.path().join("run-0");
        fs::create_dir_all(&broken).expect("run dir");
        fs::write(broken.join(VERDICT_FILE), "{").expect("verdict");

        let (summary, warnings) = aggregate(temp.path()).expect("aggregate");
        assert_eq!(summary.runs, 0);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("verdict.json invalid"));
        assert_eq!(summary.pass_rate(), None);
    }

    #[test]
    fn missing_dir_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (summary, _) = aggregate(&temp.path().join("nothing")).expect("aggregate");
        assert_eq!(summary.runs, 0);
    }
}
