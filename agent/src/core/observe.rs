//! Interpretation of action records into observations for the next turn.
//!
//! Pure functions only. [`try_observe`] reports malformed tool output as an
//! [`ObserveError`]; [`observe`] folds that error into a degraded observation
//! so the loop can always continue.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::core::action::ToolName;
use crate::core::types::{ActionRecord, CiStatus, Observation, ToolOutput, ToolResult};

const CONTENT_PREVIEW_CHARS: usize = 500;
const OUTPUT_PREVIEW_CHARS: usize = 200;
const RAW_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    #[error("tool data for '{0}' is not an object")]
    DataNotObject(String),
    #[error("field '{field}' of '{action}' is not a string")]
    FieldNotString { action: String, field: &'static str },
}

/// First failing check extracted from pipeline failure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub test: String,
    pub error: Option<String>,
}

/// Interpret `record`, degrading any interpretation fault into an observation
/// with `ci_status=unknown` that asks for another action.
pub fn observe(record: &ActionRecord) -> Observation {
    match try_observe(record) {
        Ok(observation) => observation,
        Err(err) => degraded(&err),
    }
}

/// Observation used when interpretation itself failed.
pub fn degraded(err: &ObserveError) -> Observation {
    Observation::new(
        format!("Observation failed: {err}"),
        CiStatus::Unknown,
        true,
    )
}

pub fn try_observe(record: &ActionRecord) -> Result<Observation, ObserveError> {
    let (action, output) = match record {
        ActionRecord::Error { error, .. } => {
            return Ok(Observation::new(
                format!("Error occurred: {error}"),
                CiStatus::Unknown,
                true,
            ));
        }
        ActionRecord::Success { action, result, .. } => (action.as_str(), result),
    };
    let is_pipeline = action == ToolName::RunCiPipeline.as_str();

    match output {
        ToolOutput::Raw(value) => Ok(Observation::new(
            format!(
                "Action {action} completed with result: {}",
                preview(&value.to_string(), RAW_PREVIEW_CHARS)
            ),
            CiStatus::Unknown,
            true,
        )),
        ToolOutput::Report(ToolResult::Pass { .. }) if is_pipeline => Ok(Observation::new(
            "CI pipeline passed - all checks successful!",
            CiStatus::Pass,
            false,
        )),
        ToolOutput::Report(ToolResult::Pass { data, .. }) => {
            let summary = match data {
                Some(data) => summarize_data(action, data)?,
                None => None,
            };
            let text = summary.unwrap_or_else(|| {
                format!("{action} completed successfully. Run CI pipeline to verify the fix.")
            });
            Ok(Observation::new(text, CiStatus::Unknown, true))
        }
        ToolOutput::Report(ToolResult::Fail { error, .. }) if is_pipeline => {
            let text = match parse_failure_report(error) {
                Some(check) => format!(
                    "CI pipeline failed. First issue: {} check failed. Error: {}",
                    check.test,
                    check.error.as_deref().unwrap_or("No details")
                ),
                None => format!("CI pipeline failed: {error}"),
            };
            Ok(Observation::new(text, CiStatus::Fail, true))
        }
        ToolOutput::Report(ToolResult::Fail { error, .. }) => Ok(Observation::new(
            format!(
                "{action} failed: {error}. \
                 Try a different approach or verify the file/parameters."
            ),
            CiStatus::Unknown,
            true,
        )),
    }
}

fn summarize_data(action: &str, data: &Value) -> Result<Option<String>, ObserveError> {
    let object = data
        .as_object()
        .ok_or_else(|| ObserveError::DataNotObject(action.to_string()))?;
    if let Some(content) = text_field(object, action, "content")? {
        return Ok(Some(format!(
            "File analysis complete:\n{}",
            preview(content, CONTENT_PREVIEW_CHARS)
        )));
    }
    if let Some(output) = text_field(object, action, "output")? {
        return Ok(Some(format!(
            "Test analysis: {}",
            preview(output, OUTPUT_PREVIEW_CHARS)
        )));
    }
    Ok(None)
}

fn text_field<'a>(
    object: &'a serde_json::Map<String, Value>,
    action: &str,
    field: &'static str,
) -> Result<Option<&'a str>, ObserveError> {
    match object.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ObserveError::FieldNotString {
            action: action.to_string(),
            field,
        }),
    }
}

static REPORT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("report span regex"));

/// Extract the first failing check from free-form pipeline failure text.
///
/// The span from the first `{` to the last `}` must parse as a JSON object
/// with a `checks` array. Other report fields and unknown check statuses are
/// ignored; a failing check without a `test` name is reported as `unknown`.
pub fn parse_failure_report(text: &str) -> Option<FailedCheck> {
    let span = REPORT_SPAN.find(text)?;
    let report: Value = serde_json::from_str(span.as_str()).ok()?;
    let check = report
        .get("checks")?
        .as_array()?
        .iter()
        .find(|check| check.get("status").and_then(Value::as_str) == Some("fail"))?;
    Some(FailedCheck {
        test: check
            .get("test")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        error: check.get("error").and_then(Value::as_str).map(str::to_string),
    })
}

/// Truncate on a char boundary, marking truncation with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
