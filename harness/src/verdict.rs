//! Run verdicts: the end-to-end result of one scenario run.

use serde::{Deserialize, Serialize};

use crate::scenarios::DefectDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

/// Diagnostic payload of a verdict. Fields are filled as far as the run got.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictData {
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect: Option<DefectDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Digest of the seeded workspace before the agent touched it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_digest: Option<String>,
    /// Stop label of the agent loop (`success`, `exhausted`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns: Option<u32>,
    /// CI status of the loop's last observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_status: Option<String>,
    /// Result of the independent pipeline run after the loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_ci: Option<String>,
    /// The loop reported success but the independent check failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inconsistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub status: VerdictStatus,
    pub data: VerdictData,
    pub error: Option<String>,
}

impl RunVerdict {
    pub fn pass(data: VerdictData) -> Self {
        Self {
            status: VerdictStatus::Pass,
            data,
            error: None,
        }
    }

    pub fn fail(data: VerdictData, error: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Fail,
            data,
            error: Some(error.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }
}
