//! Action executor: applies a [`Decision`] to the workspace.
//!
//! The workspace root is held explicitly and handed to every tool; the
//! process working directory is never changed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::core::action::ToolName;
use crate::core::types::{ActionRecord, Decision};
use crate::io::tools::ToolExecutor;

pub struct ActionExecutor<T> {
    tools: T,
    workspace: PathBuf,
}

impl<T: ToolExecutor> ActionExecutor<T> {
    pub fn new(tools: T, workspace: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Run the CI pipeline tool directly, outside any model decision.
    pub fn check_pipeline(&self) -> ActionRecord {
        self.invoke(ToolName::RunCiPipeline.as_str(), "")
    }

    /// Apply `decision`. Never panics or returns an error: every problem is an
    /// `ActionRecord::Error`.
    #[instrument(skip_all)]
    pub fn act(&self, decision: &Decision) -> ActionRecord {
        match decision {
            Decision::Error { error } => ActionRecord::error("", "", error.clone()),
            Decision::Proposed { tool_call, .. } => self.invoke(&tool_call.tool, &tool_call.input),
        }
    }

    fn invoke(&self, tool: &str, input: &str) -> ActionRecord {
        let tool = tool.trim();
        if tool.is_empty() {
            return ActionRecord::error(tool, input, "No tool specified in reasoning");
        }
        if !self.tools.is_registered(tool) {
            warn!(tool, "unknown tool");
            return ActionRecord::error(tool, input, format!("Unknown action: {tool}"));
        }
        let root = match fs::canonicalize(&self.workspace) {
            Ok(root) if root.is_dir() => root,
            _ => {
                let message = format!(
                    "Workspace path does not exist: {}",
                    self.workspace.display()
                );
                return ActionRecord::error(tool, input, message);
            }
        };

        debug!(tool, input, root = %root.display(), "executing tool");
        match self.tools.execute(&root, tool, input) {
            Ok(result) => ActionRecord::Success {
                action: tool.to_string(),
                input: input.to_string(),
                result,
            },
            Err(err) => {
                warn!(tool, err = %format!("{err:#}"), "tool execution failed");
                ActionRecord::Error {
                    action: tool.to_string(),
                    input: input.to_string(),
                    error: format!("Action execution failed: {err:#}"),
                    trace: Some(format!("{err:?}")),
                }
            }
        }
    }
}
