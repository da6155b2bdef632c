//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};

use agent::core::types::Decision;
use agent::exit_codes;
use agent::io::config::load_config;
use agent::io::env::Env;
use agent::io::trace::TraceWriter;
use agent::react::LoopEvent;
use agent::session::{pipeline_from_config, reasoner_from_config};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info};

use crate::orchestrate::{Orchestrator, agent_unavailable};
use crate::provision::{provision, workspace_dir};
use crate::report::aggregate;
use crate::results::{CaptureInput, TRACE_DIR, capture_run, new_run_id, results_dir};
use crate::scenarios::{SCENARIOS, find_scenario};

/// Directory layout relative to the harness root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPaths {
    pub workspaces: PathBuf,
    pub results: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            workspaces: root.join("workspaces"),
            results: root.join("results"),
        }
    }
}

/// Options for `harness run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub runs: u32,
    pub max_turns: Option<u32>,
    pub config: PathBuf,
}

pub fn list_scenarios() {
    for scenario in SCENARIOS {
        println!(
            "{:<20} budget={:<2} {}",
            scenario.name, scenario.turn_budget, scenario.description
        );
    }
}

/// Provision a workspace without running the agent.
pub fn seed_scenario(paths: &HarnessPaths, name: &str) -> Result<()> {
    let workspace = provision(&paths.workspaces, name)?;
    let descriptor =
        serde_json::to_string_pretty(&workspace.descriptor).context("serialize descriptor")?;
    println!(
        "seed: scenario={name} workspace={}",
        workspace.root.display()
    );
    println!("{descriptor}");
    Ok(())
}

/// Run a scenario `options.runs` times and print one verdict per run.
///
/// Returns the process exit code: `OK` when every verdict passed,
/// `EXHAUSTED` otherwise. Unknown scenarios and agents that cannot be built
/// still produce failing verdicts; only bad arguments and config are errors.
pub fn run_scenario(paths: &HarnessPaths, name: &str, options: &RunOptions) -> Result<i32> {
    if options.runs == 0 {
        bail!("--runs must be > 0");
    }
    if options.max_turns == Some(0) {
        bail!("--max-turns must be > 0");
    }
    let mut cfg = load_config(&options.config)?;
    let env = Env::for_config(&options.config)?;
    cfg.apply_env(|key| env.get(key));
    let model = cfg.model.name.clone();
    let pipeline = pipeline_from_config(&cfg);
    let workspaces = paths.workspaces.clone();
    let orchestrator = reasoner_from_config(&cfg, &env)
        .map(|reasoner| Orchestrator::new(reasoner, pipeline, workspaces, cfg));
    // Results are only kept for scenarios `report` can find again.
    let known = find_scenario(name).is_ok();

    info!(scenario = name, runs = options.runs, "starting runs");
    let mut all_passed = true;
    for run_num in 1..=options.runs {
        let run_id = new_run_id();
        debug!(scenario = name, run_num, %run_id, "starting run");
        let trace = if known {
            let trace_dir = results_dir(&paths.results, name, &run_id).join(TRACE_DIR);
            Some(TraceWriter::create(trace_dir)?)
        } else {
            None
        };

        let started_at = Utc::now();
        let verdict = match &orchestrator {
            Ok(orchestrator) => {
                orchestrator.run(name, options.max_turns, trace.as_ref(), print_event)
            }
            Err(err) => agent_unavailable(&paths.workspaces, name, err),
        };
        let finished_at = Utc::now();
        all_passed &= verdict.passed();

        let line = serde_json::to_string(&verdict).context("serialize verdict")?;
        println!("{line}");
        if known {
            let input = CaptureInput {
                scenario: name,
                run_id: &run_id,
                model: &model,
                started_at,
                finished_at,
                verdict: &verdict,
            };
            let dir = capture_run(&paths.results, &input).context("capture run")?;
            eprintln!(
                "run: scenario={name} run_id={run_id} results={}",
                dir.display()
            );
        }
    }
    Ok(if all_passed {
        exit_codes::OK
    } else {
        exit_codes::EXHAUSTED
    })
}

fn print_event(event: LoopEvent<'_>) {
    match event {
        LoopEvent::Initial(observation) => {
            eprintln!("  initial [{}]", observation.ci_status);
        }
        LoopEvent::Turn(record) => {
            let action = match &record.decision {
                Decision::Proposed { tool_call, .. } => tool_call.tool.as_str(),
                Decision::Error { .. } => "-",
            };
            eprintln!(
                "  turn {:>2} {:<22} [{}] failures={}",
                record.turn, action, record.observation.ci_status, record.consecutive_failures
            );
        }
    }
}

/// Print aggregated results for one scenario, or for all with results.
pub fn report(paths: &HarnessPaths, name: Option<&str>) -> Result<()> {
    let names: Vec<&str> = match name {
        Some(name) => vec![find_scenario(name)?.name],
        None => SCENARIOS
            .iter()
            .map(|scenario| scenario.name)
            .filter(|name| paths.results.join(name).is_dir())
            .collect(),
    };
    for name in names {
        let (summary, warnings) = aggregate(&paths.results.join(name))?;
        println!(
            "report: scenario={} runs={} pass={} fail={} inconsistent={}",
            name, summary.runs, summary.passed, summary.failed, summary.inconsistent
        );
        if let Some(rate) = summary.pass_rate() {
            println!("report: pass_rate={:.2}", rate);
        }
        if let Some(avg) = summary.avg_turns {
            println!("report: avg_turns={:.2}", avg);
        }
        if let Some(avg) = summary.avg_duration_secs {
            println!("report: avg_duration_secs={:.2}", avg);
        }
        for (label, count) in &summary.agent_results {
            println!("report: agent_result {} {}", label, count);
        }
        for warning in warnings {
            eprintln!("warning: {}", warning);
        }
    }
    Ok(())
}

/// Remove workspaces and results for one scenario, or for all.
pub fn clean(paths: &HarnessPaths, name: Option<&str>) -> Result<()> {
    let targets = match name {
        Some(name) => {
            let scenario = find_scenario(name)?;
            vec![
                workspace_dir(&paths.workspaces, scenario.name),
                paths.results.join(scenario.name),
            ]
        }
        None => vec![paths.workspaces.clone(), paths.results.clone()],
    };
    for target in targets {
        if target.exists() {
            fs::remove_dir_all(&target).with_context(|| format!("remove {}", target.display()))?;
            println!("clean: removed {}", target.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_then_clean_one_scenario() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        seed_scenario(&paths, "seed_05_yaml").expect("seed");
        seed_scenario(&paths, "seed_lint").expect("seed");
        let yaml = workspace_dir(&paths.workspaces, "seed_05_yaml");
        assert!(yaml.join("ci/ci_config.yml").is_file());

        clean(&paths, Some("seed_05_yaml")).expect("clean");
        assert!(!yaml.exists());
        assert!(workspace_dir(&paths.workspaces, "seed_lint").exists());

        clean(&paths, None).expect("clean all");
        assert!(!paths.workspaces.exists());
    }

    fn options(root: &Path) -> RunOptions {
        RunOptions {
            runs: 1,
            max_turns: None,
            config: root.join("agent.toml"),
        }
    }

    #[test]
    fn unknown_scenario_is_a_failing_run_without_results() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        let code = run_scenario(&paths, "seed_404", &options(temp.path())).expect("run");
        assert_eq!(code, exit_codes::EXHAUSTED);
        assert!(!paths.results.exists());
    }

    #[test]
    fn zero_runs_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        let mut options = options(temp.path());
        options.runs = 0;
        let err = run_scenario(&paths, "seed_01_syntax", &options).expect_err("zero runs");
        assert!(err.to_string().contains("--runs"));
    }
}
