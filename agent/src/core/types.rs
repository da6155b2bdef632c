//! Shared deterministic types for the agent loop.
//!
//! These types are the contracts between the reasoning engine, the action
//! executor and the observation interpreter. Their serialized shapes are the
//! JSON forms written to trace files and returned by the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool selection proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    /// Colon-delimited parameters; empty when the tool takes none.
    #[serde(default)]
    pub input: String,
}

/// Output of one reasoning step.
///
/// A proposal always carries both `reasoning` and `tool_call`; anything else
/// is an `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Decision {
    Proposed {
        reasoning: String,
        tool_call: ToolCall,
    },
    Error { error: String },
}

impl Decision {
    pub fn proposed(
        reasoning: impl Into<String>,
        tool: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self::Proposed {
            reasoning: reasoning.into(),
            tool_call: ToolCall {
                tool: tool.into(),
                input: input.into(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Outcome reported by a tool.
///
/// `status=fail` always carries `error`; `status=pass` never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Pass {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Fail {
        action: String,
        error: String,
    },
}

impl ToolResult {
    pub fn pass(action: impl Into<String>) -> Self {
        Self::Pass {
            action: action.into(),
            data: None,
        }
    }

    pub fn pass_with(action: impl Into<String>, data: Value) -> Self {
        Self::Pass {
            action: action.into(),
            data: Some(data),
        }
    }

    pub fn fail(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Fail {
            action: action.into(),
            error: error.into(),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Pass { action, .. } | Self::Fail { action, .. } => action,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }
}

/// Raw output returned by a tool executor inside a successful action record.
///
/// Built-in tools always produce a `Report`; `Raw` covers executors that hand
/// back a value without the tool result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Report(ToolResult),
    Raw(Value),
}

impl From<ToolResult> for ToolOutput {
    fn from(result: ToolResult) -> Self {
        Self::Report(result)
    }
}

/// Record of one attempted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionRecord {
    Success {
        action: String,
        input: String,
        result: ToolOutput,
    },
    Error {
        action: String,
        input: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
}

impl ActionRecord {
    pub fn error(
        action: impl Into<String>,
        input: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::Error {
            action: action.into(),
            input: input.into(),
            error: error.into(),
            trace: None,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Success { action, .. } | Self::Error { action, .. } => action,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Tri-state CI verdict carried by an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    Pass,
    Fail,
    Unknown,
}

impl CiStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpreted view of an action record, fed back to the reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub observation: String,
    pub ci_status: CiStatus,
    pub next_action_needed: bool,
}

impl Observation {
    pub fn new(
        observation: impl Into<String>,
        ci_status: CiStatus,
        next_action_needed: bool,
    ) -> Self {
        Self {
            observation: observation.into(),
            ci_status,
            next_action_needed,
        }
    }
}

/// Sub-step of a turn that went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnFault {
    Reasoning,
    Action,
    Observation,
}

/// Trace entry for one Reason-Act-Observe turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number.
    pub turn: u32,
    pub decision: Decision,
    pub action: ActionRecord,
    pub observation: Observation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<TurnFault>,
    /// Faulty turns in a row, including this one.
    pub consecutive_failures: u32,
}

impl TurnRecord {
    pub fn is_faulty(&self) -> bool {
        !self.faults.is_empty()
    }
}
