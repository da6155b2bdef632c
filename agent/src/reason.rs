//! Reasoning engine: turns the latest observation into a [`Decision`].
//!
//! The system prompt is rendered once from `prompts/system.md` with the tool
//! catalogue. Replies must be a single JSON object matching
//! `schemas/decision.schema.json`; anything else becomes `Decision::Error`.

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::action::ToolName;
use crate::core::types::Decision;
use crate::io::config::ModelConfig;
use crate::io::model::{ChatRequest, ModelClient};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const DECISION_SCHEMA: &str = include_str!("../schemas/decision.schema.json");

/// Anything that can propose the next action from an observation.
///
/// Implementations never fail: problems are reported as `Decision::Error`.
pub trait Reasoner {
    fn reason(&self, observation: &str) -> Decision;
}

impl<R: Reasoner + ?Sized> Reasoner for &R {
    fn reason(&self, observation: &str) -> Decision {
        (**self).reason(observation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("Invalid reasoning format from LLM")]
    InvalidFormat,
    #[error("Failed to parse LLM response as JSON: {0}...")]
    NotJson(String),
}

#[derive(Debug, Serialize)]
struct ToolEntry {
    name: &'static str,
    usage: &'static str,
    description: &'static str,
}

/// Render the system prompt listing every registered tool.
pub fn render_system_prompt() -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system prompt template")?;
    let tools: Vec<ToolEntry> = ToolName::ALL
        .into_iter()
        .map(|name| ToolEntry {
            name: name.as_str(),
            usage: name.usage(),
            description: name.description(),
        })
        .collect();
    let rendered = env
        .get_template("system")?
        .render(context! { tools => tools })
        .context("render system prompt")?;
    Ok(rendered)
}

/// Compile the decision schema (Draft 2020-12).
pub fn decision_validator() -> Result<Validator> {
    let schema: Value = serde_json::from_str(DECISION_SCHEMA).context("parse decision schema")?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile decision schema")
}

/// Parse a model reply into a proposal.
///
/// A single surrounding markdown code fence is tolerated.
pub fn parse_decision(reply: &str, validator: &Validator) -> Result<Decision, DecisionError> {
    let body = strip_code_fence(reply);
    let value: Value = serde_json::from_str(body).map_err(|_| {
        DecisionError::NotJson(body.chars().take(100).collect())
    })?;
    if !validator.is_valid(&value) {
        for err in validator.iter_errors(&value) {
            debug!(%err, "decision schema violation");
        }
        return Err(DecisionError::InvalidFormat);
    }
    serde_json::from_value(value).map_err(|_| DecisionError::InvalidFormat)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Reasoner backed by a language model.
pub struct LlmReasoner<M> {
    model: M,
    config: ModelConfig,
    system_prompt: String,
    validator: Validator,
}

impl<M: ModelClient> LlmReasoner<M> {
    pub fn new(model: M, config: ModelConfig) -> Result<Self> {
        Ok(Self {
            model,
            config,
            system_prompt: render_system_prompt()?,
            validator: decision_validator()?,
        })
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn request(&self, observation: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.name.clone(),
            system: self.system_prompt.clone(),
            user: format!("Current observation:\n{observation}\n\nChoose the next tool."),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        }
    }
}

impl<M: ModelClient> Reasoner for LlmReasoner<M> {
    #[instrument(skip_all)]
    fn reason(&self, observation: &str) -> Decision {
        let request = self.request(observation);
        let reply = match self.model.complete(&request) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "model call failed");
                return Decision::error(format!("Reasoning failed: {err:#}"));
            }
        };
        match parse_decision(&reply, &self.validator) {
            Ok(decision) => {
                debug!(?decision, "model proposed action");
                decision
            }
            Err(err) => {
                warn!(%err, "unusable model reply");
                Decision::error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    fn validator() -> Validator {
        decision_validator().expect("schema")
    }

    #[test]
    fn system_prompt_lists_every_tool() {
        let prompt = render_system_prompt().expect("render");
        for name in ToolName::ALL {
            assert!(prompt.contains(name.as_str()), "missing {name}");
        }
        assert!(prompt.contains("path:line:kind"));
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain = r#"{"reasoning": "fix it", "tool_call": {"tool": "fix_syntax_error",
            "input": "calculator.py:3:add_colon"}}"#;
        let expected =
            Decision::proposed("fix it", "fix_syntax_error", "calculator.py:3:add_colon");
        assert_eq!(parse_decision(plain, &validator()), Ok(expected.clone()));

        let fenced = format!("```json\n{plain}\n```\n");
        assert_eq!(parse_decision(&fenced, &validator()), Ok(expected));
    }

    #[test]
    fn missing_fields_are_invalid_format() {
        for reply in [
            r#"{"reasoning": "no tool"}"#,
            r#"{"reasoning": "x", "tool_call": {"tool": ""}}"#,
            r#"{"reasoning": 3, "tool_call": {"tool": "run_ci_pipeline"}}"#,
        ] {
            assert_eq!(
                parse_decision(reply, &validator()),
                Err(DecisionError::InvalidFormat),
                "{reply}"
            );
        }
    }

    #[test]
    fn non_json_reply_is_reported_with_preview() {
        let reply = "I think we should run the pipeline.";
        let err = parse_decision(reply, &validator()).expect_err("not json");
        assert_eq!(
            err.to_string(),
            "Failed to parse LLM response as JSON: I think we should run the pipeline...."
        );
    }

    #[test]
    fn model_failure_becomes_error_decision() {
        let model = ScriptedModel::from_results(vec![Err("connection refused".to_string())]);
        let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");
        let decision = reasoner.reason("Initial CI status: failing");
        assert_eq!(
            decision,
            Decision::error("Reasoning failed: connection refused")
        );
    }

    #[test]
    fn request_embeds_observation_and_settings() {
        let model = ScriptedModel::new(Vec::<String>::new());
        let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");
        let request = reasoner.request("CI pipeline failed: boom");
        assert!(request.user.contains("CI pipeline failed: boom"));
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.system, reasoner.system_prompt());
    }

    #[test]
    fn valid_reply_becomes_proposal() {
        let model = ScriptedModel::new([
            r#"{"reasoning":"check","tool_call":{"tool":"run_ci_pipeline"}}"#,
        ]);
        let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");
        assert_eq!(
            reasoner.reason("anything"),
            Decision::proposed("check", "run_ci_pipeline", "")
        );
    }
}
