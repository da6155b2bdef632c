//! End-to-end loop tests: scripted model replies, real tools, and an
//! in-process pipeline that inspects the workspace files.

use std::fs;
use std::path::Path;

use agent::core::types::{ActionRecord, CiStatus};
use agent::io::config::ModelConfig;
use agent::io::pipeline::{PipelineMode, PipelineRun, PipelineStatus};
use agent::io::trace::TraceWriter;
use agent::react::{LoopConfig, LoopEvent, LoopStop};
use agent::reason::LlmReasoner;
use agent::session::run_agent;
use agent::test_support::{ScriptedModel, ScriptedPipeline, TestWorkspace};

const BROKEN: &str = "# Simple calculator functions.\n\ndef add(a, b)\n    return a + b\n";

/// Fails while any `def` line lacks its trailing colon.
fn def_colon_pipeline() -> ScriptedPipeline {
    ScriptedPipeline::from_fn(|workspace: &Path| {
        let source = fs::read_to_string(workspace.join("calculator.py"))?;
        let broken = source
            .lines()
            .enumerate()
            .find(|(_, line)| line.starts_with("def ") && !line.trim_end().ends_with(':'));
        let (status, stdout) = match broken {
            None => (
                PipelineStatus::Passed,
                r#"{"overall_status": "pass", "checks": []}"#.to_string(),
            ),
            Some((index, _)) => (
                PipelineStatus::Failed,
                serde_json::json!({
                    "overall_status": "fail",
                    "checks": [{
                        "test": "syntax",
                        "status": "fail",
                        "error": format!("calculator.py:{}: expected ':'", index + 1),
                    }],
                })
                .to_string(),
            ),
        };
        Ok(PipelineRun {
            mode: PipelineMode::Script,
            status,
            stdout,
            stderr: String::new(),
        })
    })
}

fn reply(tool: &str, input: &str) -> String {
    serde_json::json!({
        "reasoning": format!("use {tool}"),
        "tool_call": { "tool": tool, "input": input },
    })
    .to_string()
}

#[test]
fn repairs_syntax_error_and_verifies() {
    let ws = TestWorkspace::new();
    ws.write("calculator.py", BROKEN);
    let model = ScriptedModel::new([
        reply("fix_syntax_error", "calculator.py:3:add_colon"),
        reply("run_ci_pipeline", ""),
    ]);
    let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");
    let pipeline = def_colon_pipeline();

    let mut events = Vec::new();
    let outcome = run_agent(
        ws.path(),
        &reasoner,
        &pipeline,
        &LoopConfig::default(),
        None,
        |event| {
            events.push(match event {
                LoopEvent::Initial(obs) => obs.observation.clone(),
                LoopEvent::Turn(record) => record.observation.observation.clone(),
            });
        },
    );

    assert_eq!(outcome.stop, LoopStop::Success);
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.final_observation.ci_status, CiStatus::Pass);
    assert!(ws.read("calculator.py").contains("def add(a, b):\n"));
    assert!(events[0].contains("expected ':'"), "{events:?}");
    assert_eq!(model.calls(), 2);
    let prompt = &model.requests()[0].user;
    assert!(prompt.contains("Initial CI status:"), "{prompt}");
}

#[test]
fn unusable_replies_abort_after_three_turns() {
    let ws = TestWorkspace::new();
    ws.write("calculator.py", BROKEN);
    let model = ScriptedModel::new(["sure, let me look", "```\nnot json\n```", "{}"]);
    let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");
    let pipeline = def_colon_pipeline();

    let outcome = run_agent(
        ws.path(),
        &reasoner,
        &pipeline,
        &LoopConfig::default(),
        None,
        |_| {},
    );

    assert_eq!(outcome.turns, 3);
    assert_eq!(
        outcome.stop,
        LoopStop::Aborted {
            last_error: "Invalid reasoning format from LLM".to_string()
        }
    );
    assert_eq!(ws.read("calculator.py"), BROKEN);
}

#[test]
fn trace_records_each_turn() {
    let ws = TestWorkspace::new();
    ws.write("calculator.py", BROKEN);
    let traces = tempfile::tempdir().expect("tempdir");
    let writer = TraceWriter::create(traces.path().join("run")).expect("trace");
    let model = ScriptedModel::new([
        reply("analyze_file", "calculator.py"),
        reply("fix_syntax_error", "calculator.py:3:add_colon"),
        reply("run_ci_pipeline", ""),
    ]);
    let reasoner = LlmReasoner::new(&model, ModelConfig::default()).expect("reasoner");

    let outcome = run_agent(
        ws.path(),
        &reasoner,
        def_colon_pipeline(),
        &LoopConfig::default(),
        Some(&writer),
        |_| {},
    );

    assert!(outcome.succeeded());
    let turn = fs::read_to_string(writer.turn_path(1)).expect("read");
    let first: serde_json::Value = serde_json::from_str(&turn).expect("json");
    assert_eq!(first["action"]["action"], "analyze_file");
    let record: ActionRecord =
        serde_json::from_value(first["action"].clone()).expect("action record");
    assert!(!record.is_error());
    let summary: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(writer.dir().join("outcome.json")).expect("read"),
    )
    .expect("json");
    assert_eq!(summary["stop"], "success");
    assert_eq!(summary["turns"], 3);
}
