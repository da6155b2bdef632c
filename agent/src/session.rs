//! Wiring a ReAct loop from an [`AgentConfig`].
//!
//! Used by the `agent` binary and by the harness orchestrator, so both build
//! the reasoner, pipeline, and tools the same way.

use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::act::ActionExecutor;
use crate::io::cache::{CachedModel, FileCache};
use crate::io::config::AgentConfig;
use crate::io::env::Env;
use crate::io::model::{ModelBackend, ModelClient};
use crate::io::pipeline::{PipelineRunner, ScriptPipelineRunner};
use crate::io::tools::Toolbox;
use crate::io::trace::TraceWriter;
use crate::react::{LoopConfig, LoopEvent, LoopOutcome, run_react_loop};
use crate::reason::{LlmReasoner, Reasoner};

/// Model client for `config`, behind the response cache when it is enabled.
pub fn model_from_config<F>(config: &AgentConfig, lookup: F) -> Result<Box<dyn ModelClient>>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = ModelBackend::from_config(&config.model, config.output_limit_bytes, lookup)?;
    if config.cache.enabled {
        let cache = FileCache::new(&config.cache.dir);
        return Ok(Box::new(CachedModel::new(backend, cache)));
    }
    Ok(Box::new(backend))
}

/// LLM reasoner for `config`, reading secrets through `env`.
pub fn reasoner_from_config(
    config: &AgentConfig,
    env: &Env,
) -> Result<LlmReasoner<Box<dyn ModelClient>>> {
    let model = model_from_config(config, |key| env.get(key))?;
    LlmReasoner::new(model, config.model.clone())
}

pub fn pipeline_from_config(config: &AgentConfig) -> ScriptPipelineRunner {
    ScriptPipelineRunner::new(config.pipeline.clone(), config.output_limit_bytes)
}

/// Run the loop against `workspace`, writing traces when `trace` is set.
///
/// Trace write failures are logged and never stop the loop.
pub fn run_agent<R, P, F>(
    workspace: &Path,
    reasoner: &R,
    pipeline: P,
    config: &LoopConfig,
    trace: Option<&TraceWriter>,
    mut on_event: F,
) -> LoopOutcome
where
    R: Reasoner,
    P: PipelineRunner,
    F: FnMut(LoopEvent<'_>),
{
    let actor = ActionExecutor::new(Toolbox::new(pipeline), workspace);
    let outcome = run_react_loop(reasoner, &actor, config, |event| {
        if let Some(trace) = trace {
            let written = match event {
                LoopEvent::Initial(observation) => trace.write_initial(observation),
                LoopEvent::Turn(record) => trace.write_turn(record),
            };
            if let Err(err) = written {
                warn!(err = %format!("{err:#}"), "trace write failed");
            }
        }
        on_event(event);
    });
    if let Some(Err(err)) = trace.map(|trace| trace.write_outcome(&outcome)) {
        warn!(err = %format!("{err:#}"), "trace write failed");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Decision;
    use crate::io::config::ModelBackendKind;
    use crate::react::LoopStop;
    use crate::test_support::{ScriptedPipeline, ScriptedReasoner, TestWorkspace};

    #[test]
    fn openai_backend_requires_key() {
        let config = AgentConfig::default();
        let err = model_from_config(&config, |_| None)
            .err()
            .expect("missing key");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn api_key_can_come_from_env_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("agent.toml");
        std::fs::write(
            temp.path().join(".env.local"),
            "AGENT_SESSION_TEST_KEY=sk-from-file\n",
        )
        .expect("write");
        let mut config = AgentConfig::default();
        config.model.api_key_env = "AGENT_SESSION_TEST_KEY".to_string();
        config.cache.enabled = false;

        assert!(reasoner_from_config(&config, &Env::default()).is_err());
        let env = Env::for_config(&config_path).expect("env");
        assert!(reasoner_from_config(&config, &env).is_ok());
    }

    #[test]
    fn command_backend_needs_no_key() {
        let mut config = AgentConfig::default();
        config.model.backend = ModelBackendKind::Command;
        config.cache.enabled = false;
        assert!(model_from_config(&config, |_| None).is_ok());
    }

    #[test]
    fn traces_every_turn_and_the_outcome() {
        let ws = TestWorkspace::new();
        let traces = tempfile::tempdir().expect("tempdir");
        let writer = TraceWriter::create(traces.path()).expect("trace");
        let reasoner = ScriptedReasoner::always(Decision::proposed("check", "run_ci_pipeline", ""));
        let pipeline = ScriptedPipeline::failing("boom");
        let config = LoopConfig {
            max_turns: 2,
            max_consecutive_failures: 3,
        };

        let mut seen = 0;
        let outcome = run_agent(ws.path(), &reasoner, &pipeline, &config, Some(&writer), |_| {
            seen += 1;
        });

        assert_eq!(outcome.stop, LoopStop::Exhausted);
        assert_eq!(seen, 3);
        assert!(traces.path().join("initial.json").is_file());
        assert!(writer.turn_path(1).is_file());
        assert!(writer.turn_path(2).is_file());
        assert!(traces.path().join("outcome.json").is_file());
    }
}
