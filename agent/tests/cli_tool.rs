//! CLI tests for `agent tool`, `agent tools` and `agent init-config`.

use std::process::Command;

use agent::exit_codes;
use agent::test_support::TestWorkspace;

fn agent() -> Command {
    Command::new(env!("CARGO_BIN_EXE_agent"))
}

#[test]
fn tools_lists_every_tool() {
    let output = agent().arg("tools").output().expect("agent tools");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for tool in [
        "fix_syntax_error",
        "add_import",
        "run_ci_pipeline",
        "fix_yaml_syntax",
    ] {
        assert!(stdout.contains(tool), "missing {tool}");
    }
}

#[test]
fn tool_applies_a_syntax_fix() {
    let ws = TestWorkspace::new();
    ws.write(
        "calculator.py",
        "# Simple calculator functions.\n\ndef add(a, b)\n    return a + b\n",
    );

    let output = agent()
        .args(["tool"])
        .arg(ws.path())
        .args(["fix_syntax_error", "calculator.py:3:add_colon"])
        .arg("--config")
        .arg(ws.file("missing.toml"))
        .output()
        .expect("agent tool");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(ws.read("calculator.py").contains("def add(a, b):\n"));
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(record["status"], "success");
    assert_eq!(record["result"]["status"], "pass");
}

#[test]
fn tool_failure_exits_invalid() {
    let ws = TestWorkspace::new();
    let output = agent()
        .arg("tool")
        .arg(ws.path())
        .args(["analyze_file", "missing.py"])
        .arg("--config")
        .arg(ws.file("missing.toml"))
        .output()
        .expect("agent tool");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(record["result"]["status"], "fail");
}

#[test]
fn run_rejects_missing_workspace() {
    let ws = TestWorkspace::new();
    let status = agent()
        .arg("run")
        .arg(ws.file("nope"))
        .status()
        .expect("agent run");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn init_config_writes_defaults() {
    let ws = TestWorkspace::new();
    let status = agent()
        .arg("init-config")
        .arg(ws.file("agent.toml"))
        .status()
        .expect("agent init-config");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(ws.read("agent.toml").contains("max_turns = 20"));
}
