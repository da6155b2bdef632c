//! CI pipeline execution inside a workspace.
//!
//! The [`PipelineRunner`] trait decouples the tools from the way the pipeline
//! is actually run. Production uses [`ScriptPipelineRunner`], which shells out
//! to the workspace's CI script; tests use scripted runners that evaluate the
//! workspace in-process.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::io::config::PipelineConfig;
use crate::io::process::run_command_with_timeout;

/// Which command produced a [`PipelineRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// The workspace CI script.
    Script,
    /// The bare test command used when the script is missing.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Passed,
    Failed,
    TimedOut,
}

/// Captured result of one pipeline or test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub mode: PipelineMode,
    pub status: PipelineStatus,
    pub stdout: String,
    pub stderr: String,
}

impl PipelineRun {
    pub fn passed(&self) -> bool {
        self.status == PipelineStatus::Passed
    }
}

/// Abstraction over CI pipeline backends.
///
/// `Err` means the pipeline could not be run at all (e.g. spawn failure);
/// a pipeline that ran and failed is `Ok` with `PipelineStatus::Failed`.
pub trait PipelineRunner {
    /// Run the full pipeline, falling back to the test command when the
    /// workspace has no CI script.
    fn run(&self, workspace: &Path) -> Result<PipelineRun>;

    /// Run only the test command.
    fn run_tests(&self, workspace: &Path) -> Result<PipelineRun>;
}

impl<P: PipelineRunner + ?Sized> PipelineRunner for &P {
    fn run(&self, workspace: &Path) -> Result<PipelineRun> {
        (**self).run(workspace)
    }

    fn run_tests(&self, workspace: &Path) -> Result<PipelineRun> {
        (**self).run_tests(workspace)
    }
}

/// Runs the configured commands as child processes in the workspace.
#[derive(Debug, Clone)]
pub struct ScriptPipelineRunner {
    config: PipelineConfig,
    output_limit_bytes: usize,
}

impl ScriptPipelineRunner {
    pub fn new(config: PipelineConfig, output_limit_bytes: usize) -> Self {
        Self {
            config,
            output_limit_bytes,
        }
    }

    fn run_command(
        &self,
        workspace: &Path,
        argv: &[String],
        timeout: Duration,
        mode: PipelineMode,
    ) -> Result<PipelineRun> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("pipeline command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(workspace);

        let output = run_command_with_timeout(cmd, None, timeout, self.output_limit_bytes)
            .with_context(|| format!("run {}", argv.join(" ")))?;
        let status = if output.timed_out {
            PipelineStatus::TimedOut
        } else if output.status.success() {
            PipelineStatus::Passed
        } else {
            PipelineStatus::Failed
        };
        debug!(?mode, ?status, "pipeline command finished");
        Ok(PipelineRun {
            mode,
            status,
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
        })
    }
}

impl PipelineRunner for ScriptPipelineRunner {
    #[instrument(skip_all, fields(workspace = %workspace.display()))]
    fn run(&self, workspace: &Path) -> Result<PipelineRun> {
        if workspace.join(&self.config.script).is_file() {
            info!(script = %self.config.script, "running CI script");
            self.run_command(
                workspace,
                &self.config.command,
                self.config.timeout(),
                PipelineMode::Script,
            )
        } else {
            info!(script = %self.config.script, "CI script missing, running fallback tests");
            self.run_tests(workspace)
        }
    }

    #[instrument(skip_all, fields(workspace = %workspace.display()))]
    fn run_tests(&self, workspace: &Path) -> Result<PipelineRun> {
        self.run_command(
            workspace,
            &self.config.fallback_command,
            self.config.fallback_timeout(),
            PipelineMode::Fallback,
        )
    }
}
