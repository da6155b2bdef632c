//! CI autofix agent CLI.
//!
//! `agent run` drives the ReAct loop against a workspace until its CI
//! pipeline passes; `agent tool` applies a single tool by hand.

use std::path::{Path, PathBuf};

use agent::act::ActionExecutor;
use agent::core::action::ToolName;
use agent::core::types::{ActionRecord, Decision, ToolOutput, ToolResult};
use agent::exit_codes;
use agent::io::config::{AgentConfig, load_config, write_config};
use agent::io::env::Env;
use agent::io::tools::Toolbox;
use agent::io::trace::TraceWriter;
use agent::logging;
use agent::react::{LoopConfig, LoopEvent, LoopOutcome, LoopStop};
use agent::session::{pipeline_from_config, reasoner_from_config, run_agent};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

const DEFAULT_CONFIG: &str = "agent.toml";

#[derive(Parser)]
#[command(name = "agent", version, about = "ReAct agent that repairs failing CI pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reason/act/observe loop until the workspace's pipeline passes.
    Run {
        /// Workspace directory to repair.
        workspace: PathBuf,
        /// Config file (defaults apply when it does not exist).
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Override `max_turns` from the config.
        #[arg(long)]
        max_turns: Option<u32>,
        /// Write per-turn JSON traces into this directory.
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },
    /// Apply one tool to a workspace and print the action record.
    Tool {
        workspace: PathBuf,
        /// Tool name, e.g. `fix_syntax_error`.
        tool: String,
        /// Tool parameter string, e.g. `calculator.py:3:add_colon`.
        #[arg(default_value = "")]
        input: String,
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// List the registered tools.
    Tools,
    /// Write a config file with default values.
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            workspace,
            config,
            max_turns,
            trace_dir,
        } => cmd_run(&workspace, &config, max_turns, trace_dir),
        Command::Tool {
            workspace,
            tool,
            input,
            config,
        } => cmd_tool(&workspace, &tool, &input, &config),
        Command::Tools => {
            cmd_tools();
            Ok(exit_codes::OK)
        }
        Command::InitConfig { path, force } => cmd_init_config(&path, force),
    }
}

fn load(path: &Path) -> Result<(AgentConfig, Env)> {
    let mut cfg = load_config(path)?;
    let env = Env::for_config(path)?;
    cfg.apply_env(|key| env.get(key));
    Ok((cfg, env))
}

fn cmd_run(
    workspace: &Path,
    config_path: &Path,
    max_turns: Option<u32>,
    trace_dir: Option<PathBuf>,
) -> Result<i32> {
    if !workspace.is_dir() {
        bail!("workspace {} is not a directory", workspace.display());
    }
    let (cfg, env) = load(config_path)?;
    let mut loop_config = LoopConfig::from(&cfg);
    if let Some(max_turns) = max_turns {
        if max_turns == 0 {
            bail!("--max-turns must be > 0");
        }
        loop_config.max_turns = max_turns;
    }
    let reasoner = reasoner_from_config(&cfg, &env)?;
    let trace = trace_dir.map(TraceWriter::create).transpose()?;

    let outcome = run_agent(
        workspace,
        &reasoner,
        pipeline_from_config(&cfg),
        &loop_config,
        trace.as_ref(),
        print_event,
    );
    let json = serde_json::to_string_pretty(&outcome).context("serialize outcome")?;
    println!("{json}");
    Ok(outcome_exit_code(&outcome))
}

fn print_event(event: LoopEvent<'_>) {
    match event {
        LoopEvent::Initial(observation) => {
            eprintln!("initial: {}", first_line(&observation.observation));
        }
        LoopEvent::Turn(record) => {
            let tool = match &record.decision {
                Decision::Proposed { tool_call, .. } => {
                    format!("{} {}", tool_call.tool, tool_call.input)
                }
                Decision::Error { .. } => "<no decision>".to_string(),
            };
            eprintln!(
                "turn {}: {} -> {:?} ({})",
                record.turn,
                tool.trim_end(),
                record.observation.ci_status,
                first_line(&record.observation.observation)
            );
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn outcome_exit_code(outcome: &LoopOutcome) -> i32 {
    match outcome.stop {
        LoopStop::AlreadyPassing | LoopStop::Success => exit_codes::OK,
        LoopStop::NoFurtherAction | LoopStop::Exhausted => exit_codes::EXHAUSTED,
        LoopStop::Aborted { .. } => exit_codes::ABORTED,
    }
}

fn cmd_tool(workspace: &Path, tool: &str, input: &str, config_path: &Path) -> Result<i32> {
    let (cfg, _) = load(config_path)?;
    let executor = ActionExecutor::new(Toolbox::new(pipeline_from_config(&cfg)), workspace);
    let record = executor.act(&Decision::proposed("manual invocation", tool, input));
    let json = serde_json::to_string_pretty(&record).context("serialize action record")?;
    println!("{json}");
    let passed = matches!(
        record,
        ActionRecord::Success {
            result: ToolOutput::Report(ToolResult::Pass { .. }),
            ..
        }
    );
    Ok(if passed { exit_codes::OK } else { exit_codes::INVALID })
}

fn cmd_tools() {
    for name in ToolName::ALL {
        println!("{:<24} {}", name.as_str(), name.usage());
        println!("{:<24} {}", "", name.description());
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &AgentConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::core::types::{CiStatus, Observation};

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "agent",
            "run",
            "workspaces/test_seed_01_syntax",
            "--max-turns",
            "3",
            "--trace-dir",
            "traces",
        ])
        .expect("parse");
        let Command::Run {
            workspace,
            config,
            max_turns,
            trace_dir,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(workspace, PathBuf::from("workspaces/test_seed_01_syntax"));
        assert_eq!(config, PathBuf::from(DEFAULT_CONFIG));
        assert_eq!(max_turns, Some(3));
        assert_eq!(trace_dir, Some(PathBuf::from("traces")));
    }

    #[test]
    fn tool_input_defaults_to_empty() {
        let cli = Cli::try_parse_from(["agent", "tool", "ws", "run_ci_pipeline"]).expect("parse");
        let Command::Tool { tool, input, .. } = cli.command else {
            panic!("expected tool");
        };
        assert_eq!(tool, "run_ci_pipeline");
        assert_eq!(input, "");
    }

    #[test]
    fn exit_codes_follow_the_stop_reason() {
        let outcome = |stop| LoopOutcome {
            turns: 1,
            stop,
            final_observation: Observation::new("x", CiStatus::Fail, true),
        };
        assert_eq!(
            outcome_exit_code(&outcome(LoopStop::Success)),
            exit_codes::OK
        );
        assert_eq!(
            outcome_exit_code(&outcome(LoopStop::Exhausted)),
            exit_codes::EXHAUSTED
        );
        assert_eq!(
            outcome_exit_code(&outcome(LoopStop::Aborted {
                last_error: "boom".to_string()
            })),
            exit_codes::ABORTED
        );
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        assert_eq!(
            cmd_init_config(&path, false).expect("write"),
            exit_codes::OK
        );
        assert!(cmd_init_config(&path, false).is_err());
        assert_eq!(cmd_init_config(&path, true).expect("force"), exit_codes::OK);
        assert_eq!(load_config(&path).expect("load"), AgentConfig::default());
    }
}
