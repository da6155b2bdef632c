//! Scenario orchestration: provision, run the agent loop, then re-check CI.
//!
//! [`Orchestrator::run`] never fails. Every stage error becomes a failing
//! [`RunVerdict`] with a readable `error`.

use std::path::{Path, PathBuf};

use agent::core::types::CiStatus;
use agent::io::config::AgentConfig;
use agent::io::pipeline::PipelineRunner;
use agent::io::trace::TraceWriter;
use agent::react::{LoopConfig, LoopEvent};
use agent::reason::Reasoner;
use agent::session::run_agent;
use tracing::{info, instrument, warn};

use crate::provision::{ProvisionedWorkspace, provision};
use crate::verdict::{RunVerdict, VerdictData};

pub struct Orchestrator<R, P> {
    reasoner: R,
    pipeline: P,
    workspaces_dir: PathBuf,
    config: AgentConfig,
}

impl<R: Reasoner, P: PipelineRunner> Orchestrator<R, P> {
    pub fn new(
        reasoner: R,
        pipeline: P,
        workspaces_dir: impl Into<PathBuf>,
        config: AgentConfig,
    ) -> Self {
        Self {
            reasoner,
            pipeline,
            workspaces_dir: workspaces_dir.into(),
            config,
        }
    }

    pub fn workspaces_dir(&self) -> &Path {
        &self.workspaces_dir
    }

    /// Run `scenario` end to end.
    ///
    /// `max_turns` overrides the scenario's own turn budget. The verdict
    /// passes only when the loop succeeded and the independent pipeline run
    /// agrees.
    #[instrument(skip_all, fields(scenario = %scenario))]
    pub fn run<F>(
        &self,
        scenario: &str,
        max_turns: Option<u32>,
        trace: Option<&TraceWriter>,
        on_event: F,
    ) -> RunVerdict
    where
        F: FnMut(LoopEvent<'_>),
    {
        let (workspace, mut data) = match provision_stage(&self.workspaces_dir, scenario) {
            Ok(provisioned) => provisioned,
            Err(verdict) => return *verdict,
        };
        let root = workspace.root.as_path();

        let loop_config = LoopConfig {
            max_turns: max_turns.unwrap_or(workspace.scenario.turn_budget),
            max_consecutive_failures: self.config.max_consecutive_failures,
        };
        let outcome = run_agent(
            root,
            &self.reasoner,
            &self.pipeline,
            &loop_config,
            trace,
            on_event,
        );
        let ci_status = outcome.final_observation.ci_status;
        data.agent_result = Some(outcome.label().to_string());
        data.turns = Some(outcome.turns);
        data.ci_status = Some(ci_status.to_string());

        let script = root.join(&self.config.pipeline.script);
        if !script.is_file() {
            let message = format!("CI pipeline file missing: {}", script.display());
            return RunVerdict::fail(data, message);
        }
        let final_run = match self.pipeline.run(root) {
            Ok(run) => run,
            Err(err) => {
                let message = format!(
                    "CI status check failed in workspace '{}': {err:#}",
                    root.display()
                );
                return RunVerdict::fail(data, message);
            }
        };
        let final_ci = if final_run.passed() {
            CiStatus::Pass
        } else {
            CiStatus::Fail
        };
        data.final_ci = Some(final_ci.to_string());

        if outcome.succeeded() && final_run.passed() {
            info!(turns = outcome.turns, "scenario passed");
            return RunVerdict::pass(data);
        }
        if outcome.succeeded() {
            warn!(
                turns = outcome.turns,
                "agent reported success but the independent pipeline run failed"
            );
            data.inconsistent = true;
        }
        let error = format!(
            "Agent result: {}, CI status: {ci_status}, Final CI: {final_ci}",
            outcome.label()
        );
        info!(%error, "scenario failed");
        RunVerdict::fail(data, error)
    }
}

/// Verdict for a run whose agent could not be constructed.
///
/// The workspace is still provisioned first, so an unknown scenario reports
/// the provisioning failure rather than the agent failure.
pub fn agent_unavailable(workspaces_dir: &Path, scenario: &str, err: &anyhow::Error) -> RunVerdict {
    match provision_stage(workspaces_dir, scenario) {
        Ok((_, data)) => {
            warn!(err = %format!("{err:#}"), "agent could not be started");
            RunVerdict::fail(data, format!("Agent execution failed: {err:#}"))
        }
        Err(verdict) => *verdict,
    }
}

fn provision_stage(
    workspaces_dir: &Path,
    scenario: &str,
) -> Result<(ProvisionedWorkspace, VerdictData), Box<RunVerdict>> {
    let mut data = VerdictData {
        scenario: scenario.to_string(),
        ..VerdictData::default()
    };
    let workspace = match provision(workspaces_dir, scenario) {
        Ok(workspace) => workspace,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "provisioning failed");
            return Err(Box::new(RunVerdict::fail(
                data,
                format!("Workspace creation failed for seed '{scenario}': {err:#}"),
            )));
        }
    };
    data.description = Some(workspace.scenario.description.to_string());
    data.defect = Some(workspace.descriptor.clone());
    data.workspace = Some(workspace.root.display().to_string());
    data.seed_digest = Some(workspace.digest.clone());
    Ok((workspace, data))
}
