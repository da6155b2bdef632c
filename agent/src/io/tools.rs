//! Tool registry: resolves tool names and applies them to a workspace.
//!
//! Every built-in tool reports problems as a `fail` [`ToolResult`] with a
//! tool-specific prefix; [`Toolbox::execute`] never returns `Err`. The
//! [`ToolExecutor`] trait leaves room for executors that can fail outright,
//! which the action executor then records as an action error.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::action::{Action, ToolName};
use crate::core::edits;
use crate::core::path::workspace_file;
use crate::core::types::{ToolOutput, ToolResult};
use crate::io::pipeline::{PipelineMode, PipelineRun, PipelineRunner, PipelineStatus};

/// Action name reported for unregistered tools.
pub const UNKNOWN_ACTION: &str = "unknown_action";

const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Abstraction over tool execution backends.
pub trait ToolExecutor {
    /// Whether `tool` names a registered tool.
    fn is_registered(&self, tool: &str) -> bool;

    /// Run `tool` with its raw parameter string against `workspace`.
    fn execute(&self, workspace: &Path, tool: &str, input: &str) -> Result<ToolOutput>;
}

impl<T: ToolExecutor + ?Sized> ToolExecutor for &T {
    fn is_registered(&self, tool: &str) -> bool {
        (**self).is_registered(tool)
    }

    fn execute(&self, workspace: &Path, tool: &str, input: &str) -> Result<ToolOutput> {
        (**self).execute(workspace, tool, input)
    }
}

/// The built-in tools, backed by a pipeline runner for the CI tools.
#[derive(Debug, Clone)]
pub struct Toolbox<P> {
    pipeline: P,
}

impl<P: PipelineRunner> Toolbox<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Resolve `tool`, parse `input` and run it.
    #[instrument(skip_all, fields(tool = %tool, input = %input))]
    pub fn dispatch(&self, workspace: &Path, tool: &str, input: &str) -> ToolResult {
        let Ok(name) = tool.parse::<ToolName>() else {
            warn!("unknown tool requested");
            return ToolResult::fail(UNKNOWN_ACTION, format!("Unknown action: {tool}"));
        };
        let result = match Action::parse(name, input) {
            Ok(action) => self.run(workspace, &action),
            Err(err) => {
                ToolResult::fail(name.as_str(), format!("{}{err}", error_prefix(name, input)))
            }
        };
        match &result {
            ToolResult::Pass { .. } => info!("tool passed"),
            ToolResult::Fail { error, .. } => info!(%error, "tool failed"),
        }
        result
    }

    /// Run an already parsed action.
    pub fn run(&self, workspace: &Path, action: &Action) -> ToolResult {
        let name = action.tool();
        let outcome = match action {
            Action::RunCiPipeline => return self.run_pipeline(workspace),
            Action::RunTests => return self.run_tests(workspace),
            Action::AnalyzeFile { path } => return analyze_file(workspace, path),
            Action::FixSyntaxError { target, kind } => edit_file(workspace, &target.path, |text| {
                edits::fix_syntax(text, target.line, *kind).map_err(Into::into)
            }),
            Action::AddImport { path, statement } => edit_file(workspace, path, |text| {
                Ok(edits::prepend_import(text, statement))
            }),
            Action::RemoveUnusedImport { path, statement } => edit_file(workspace, path, |text| {
                let (updated, removed) = edits::remove_import(text, statement);
                if removed == 0 {
                    anyhow::bail!("'{statement}' not found in {path}");
                }
                Ok(updated)
            }),
            Action::FixTestAssertion { target, expected } => {
                edit_file(workspace, &target.path, |text| {
                    edits::fix_assertion(text, target.line, expected).map_err(Into::into)
                })
            }
            Action::AddDependency { package } => add_dependency(workspace, package),
            Action::FixYamlSyntax { target, kind } => edit_file(workspace, &target.path, |text| {
                edits::fix_yaml(text, target.line, *kind).map_err(Into::into)
            }),
        };
        match outcome {
            Ok(()) => ToolResult::pass(name.as_str()),
            Err(err) => {
                ToolResult::fail(name.as_str(), format!("{}{err:#}", error_prefix(name, "")))
            }
        }
    }

    fn run_pipeline(&self, workspace: &Path) -> ToolResult {
        let action = ToolName::RunCiPipeline.as_str();
        match self.pipeline.run(workspace) {
            Ok(run) => pipeline_result(action, &run, "CI pipeline timed out"),
            Err(err) => ToolResult::fail(action, format!("CI error - {err:#}")),
        }
    }

    fn run_tests(&self, workspace: &Path) -> ToolResult {
        let action = ToolName::RunTests.as_str();
        match self.pipeline.run_tests(workspace) {
            Ok(run) => pipeline_result(action, &run, "Tests timed out"),
            Err(err) => ToolResult::fail(action, format!("Test error - {err:#}")),
        }
    }
}

impl<P: PipelineRunner> ToolExecutor for Toolbox<P> {
    fn is_registered(&self, tool: &str) -> bool {
        tool.parse::<ToolName>().is_ok()
    }

    fn execute(&self, workspace: &Path, tool: &str, input: &str) -> Result<ToolOutput> {
        Ok(ToolOutput::Report(self.dispatch(workspace, tool, input)))
    }
}

fn pipeline_result(action: &str, run: &PipelineRun, timeout_message: &str) -> ToolResult {
    match (run.status, run.mode) {
        (PipelineStatus::Passed, _) => {
            ToolResult::pass_with(action, json!({ "output": run.stdout }))
        }
        (PipelineStatus::TimedOut, _) => ToolResult::fail(action, timeout_message),
        (PipelineStatus::Failed, PipelineMode::Script) => {
            ToolResult::fail(action, format!("CI pipeline failed\n{}", run.stdout))
        }
        (PipelineStatus::Failed, PipelineMode::Fallback) => {
            let output = format!("Test failures:\n{}\n{}", run.stdout, run.stderr);
            ToolResult::fail(action, output)
        }
    }
}

/// Prefix for failure messages of `tool`. `analyze_file` names the file.
fn error_prefix(tool: ToolName, input: &str) -> String {
    match tool {
        ToolName::RunCiPipeline => "CI error - ".to_string(),
        ToolName::RunTests => "Test error - ".to_string(),
        ToolName::AnalyzeFile => format!("Error reading {}: ", input.trim()),
        ToolName::FixSyntaxError => "Error fixing syntax: ".to_string(),
        ToolName::AddImport => "Error adding import: ".to_string(),
        ToolName::RemoveUnusedImport => "Error removing import: ".to_string(),
        ToolName::FixTestAssertion => "Error fixing test: ".to_string(),
        ToolName::AddDependency => "Error adding dependency: ".to_string(),
        ToolName::FixYamlSyntax => "Error fixing YAML: ".to_string(),
    }
}

fn analyze_file(workspace: &Path, relative: &str) -> ToolResult {
    let action = ToolName::AnalyzeFile.as_str();
    let read = workspace_file(workspace, relative)
        .map_err(anyhow::Error::from)
        .and_then(|path| {
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
        });
    match read {
        Ok(text) => {
            let content: String = text
                .lines()
                .enumerate()
                .map(|(i, line)| format!("Line {}: {line}\n", i + 1))
                .collect();
            ToolResult::pass_with(action, json!({ "file": relative, "content": content }))
        }
        Err(err) => ToolResult::fail(action, format!("Error reading {relative}: {err:#}")),
    }
}

/// Read a workspace file, transform it and write it back.
fn edit_file<F>(workspace: &Path, relative: &str, transform: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<String>,
{
    let path = workspace_file(workspace, relative)?;
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let updated = transform(&text)?;
    if updated == text {
        debug!(file = %path.display(), "edit left file unchanged");
        return Ok(());
    }
    fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
    debug!(file = %path.display(), "file updated");
    Ok(())
}

fn add_dependency(workspace: &Path, package: &str) -> Result<()> {
    let path = workspace.join(REQUIREMENTS_FILE);
    let text = if path.exists() {
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?
    } else {
        String::new()
    };
    match edits::append_requirement(&text, package) {
        Some(updated) => {
            fs::write(&path, updated).with_context(|| format!("write {}", path.display()))
        }
        None => {
            debug!(package, "dependency already listed");
            Ok(())
        }
    }
}
