//! The Reason-Act-Observe control loop.
//!
//! ```text
//! INITIAL_CHECK --pass--> SUCCESS (0 turns)
//!       |
//!       v
//! LOOPING(turn) --ci pass------------------> SUCCESS
//!       |       --no further action needed--> NO_FURTHER_ACTION
//!       |       --faulty streak at limit----> ABORTED
//!       +-------- turn budget spent ---------> EXHAUSTED
//! ```

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::act::ActionExecutor;
use crate::core::budget::FailureStreak;
use crate::core::observe::{degraded, try_observe};
use crate::core::types::{ActionRecord, CiStatus, Observation, TurnFault, TurnRecord};
use crate::io::config::AgentConfig;
use crate::io::tools::ToolExecutor;
use crate::reason::Reasoner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_turns: u32,
    pub max_consecutive_failures: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_consecutive_failures: 3,
        }
    }
}

impl From<&AgentConfig> for LoopConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

/// Reason why `run_react_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stop", rename_all = "snake_case")]
pub enum LoopStop {
    /// The initial pipeline check already passed.
    AlreadyPassing,
    /// A turn observed a passing pipeline.
    Success,
    /// An observation said no further action was needed without a pass.
    NoFurtherAction,
    /// The turn budget ran out.
    Exhausted,
    /// Too many faulty turns in a row.
    Aborted { last_error: String },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    pub turns: u32,
    #[serde(flatten)]
    pub stop: LoopStop,
    pub final_observation: Observation,
}

impl LoopOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.stop, LoopStop::AlreadyPassing | LoopStop::Success)
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self.stop {
            LoopStop::AlreadyPassing | LoopStop::Success => "success",
            LoopStop::NoFurtherAction => "no_further_action",
            LoopStop::Exhausted => "exhausted",
            LoopStop::Aborted { .. } => "aborted",
        }
    }
}

/// Progress notifications for trace writers and CLIs.
#[derive(Debug, Clone, Copy)]
pub enum LoopEvent<'a> {
    /// Observation that seeds the first turn.
    Initial(&'a Observation),
    Turn(&'a TurnRecord),
}

/// Drive reason, act and observe until the pipeline passes or a limit is hit.
///
/// Never fails: every fault inside a turn is folded into the trace and the
/// consecutive-failure count.
#[instrument(
    skip_all,
    fields(max_turns = config.max_turns, max_failures = config.max_consecutive_failures)
)]
pub fn run_react_loop<R, T, F>(
    reasoner: &R,
    actor: &ActionExecutor<T>,
    config: &LoopConfig,
    mut on_event: F,
) -> LoopOutcome
where
    R: Reasoner,
    T: ToolExecutor,
    F: FnMut(LoopEvent<'_>),
{
    let initial_record = actor.check_pipeline();
    let initial = match try_observe(&initial_record) {
        Ok(observation) => observation,
        Err(err) => degraded(&err),
    };
    if initial.ci_status == CiStatus::Pass {
        info!("pipeline already passing");
        on_event(LoopEvent::Initial(&initial));
        return LoopOutcome {
            turns: 0,
            stop: LoopStop::AlreadyPassing,
            final_observation: initial,
        };
    }

    let seed = Observation {
        observation: format!("Initial CI status: {}", initial.observation),
        ..initial
    };
    on_event(LoopEvent::Initial(&seed));

    // Prompt for the next turn. After a faulty turn it keeps the last clean
    // observation and appends the fault.
    let mut prompt = seed.observation.clone();
    let mut last_clean = prompt.clone();
    let mut current = seed;
    let mut streak = FailureStreak::new(config.max_consecutive_failures);
    let mut turns = 0u32;

    while turns < config.max_turns {
        turns += 1;
        let decision = reasoner.reason(&prompt);
        let record = actor.act(&decision);

        let mut faults = Vec::new();
        if decision.is_error() {
            faults.push(TurnFault::Reasoning);
        }
        if record.is_error() {
            faults.push(TurnFault::Action);
        }
        let observation = match try_observe(&record) {
            Ok(observation) => observation,
            Err(err) => {
                faults.push(TurnFault::Observation);
                degraded(&err)
            }
        };

        let aborted = streak.record(!faults.is_empty());
        let turn = TurnRecord {
            turn: turns,
            decision,
            action: record,
            observation,
            faults,
            consecutive_failures: streak.count(),
        };
        info!(
            turn = turn.turn,
            action = turn.action.action(),
            ci_status = ?turn.observation.ci_status,
            faulty = turn.is_faulty(),
            "turn finished"
        );
        on_event(LoopEvent::Turn(&turn));
        let faulty = turn.is_faulty();

        let TurnRecord {
            observation,
            action,
            ..
        } = turn;

        if observation.ci_status == CiStatus::Pass {
            info!(turns, "pipeline passing");
            return LoopOutcome {
                turns,
                stop: LoopStop::Success,
                final_observation: observation,
            };
        }
        if aborted {
            let last_error = match &action {
                ActionRecord::Error { error, .. } => error.clone(),
                ActionRecord::Success { .. } => observation.observation.clone(),
            };
            warn!(turns, %last_error, "too many consecutive failures");
            return LoopOutcome {
                turns,
                stop: LoopStop::Aborted { last_error },
                final_observation: observation,
            };
        }
        if !observation.next_action_needed {
            info!(turns, "no further action needed");
            return LoopOutcome {
                turns,
                stop: LoopStop::NoFurtherAction,
                final_observation: observation,
            };
        }
        if faulty {
            prompt = format!(
                "{last_clean}\n\nLast attempt failed: {}",
                observation.observation
            );
        } else {
            last_clean = observation.observation.clone();
            prompt = last_clean.clone();
        }
        current = observation;
    }

    warn!(turns, "turn budget exhausted");
    LoopOutcome {
        turns,
        stop: LoopStop::Exhausted,
        final_observation: current,
    }
}
