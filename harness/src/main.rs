use std::path::PathBuf;

use agent::{exit_codes, logging};
use anyhow::Result;
use clap::{Parser, Subcommand};
use harness::cli::{self, HarnessPaths, RunOptions};

#[derive(Parser)]
#[command(name = "harness", version, about = "Scenario harness for the CI autofix agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List scenario ids with their turn budgets.
    List,
    /// Provision a scenario workspace without running the agent.
    Seed { scenario: String },
    /// Provision, run the agent, and re-check the pipeline.
    Run {
        scenario: String,
        #[arg(long, default_value_t = 1)]
        runs: u32,
        /// Override the scenario's turn budget.
        #[arg(long)]
        max_turns: Option<u32>,
        #[arg(short, long, default_value = "agent.toml")]
        config: PathBuf,
    },
    /// Summarize recorded runs.
    Report { scenario: Option<String> },
    /// Remove workspaces and results.
    Clean { scenario: Option<String> },
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
    let paths = HarnessPaths::new(&std::env::current_dir()?);
    match cli.command {
        Command::List => cli::list_scenarios(),
        Command::Seed { scenario } => cli::seed_scenario(&paths, &scenario)?,
        Command::Run {
            scenario,
            runs,
            max_turns,
            config,
        } => {
            let options = RunOptions {
                runs,
                max_turns,
                config,
            };
            return cli::run_scenario(&paths, &scenario, &options);
        }
        Command::Report { scenario } => cli::report(&paths, scenario.as_deref())?,
        Command::Clean { scenario } => cli::clean(&paths, scenario.as_deref())?,
    }
    Ok(exit_codes::OK)
}
