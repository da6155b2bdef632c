//! CI autofix agent.
//!
//! A ReAct loop that reasons about a failing CI pipeline, applies one narrow
//! repair tool per turn, and observes the result until the pipeline passes or
//! a budget runs out. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure logic (action parsing, file edits, observation
//!   interpretation, failure budget). No I/O.
//! - **[`io`]**: Side effects (processes, the CI pipeline, tools, model
//!   backends, response cache, config, traces).
//!
//! [`reason`], [`act`] and [`react`] compose the two into the loop, and
//! [`session`] wires a loop from an [`io::config::AgentConfig`].

pub mod act;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod react;
pub mod reason;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
