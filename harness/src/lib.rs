//! Scenario harness for the CI autofix agent.
//!
//! Seeds copies of a small baseline project with known defects, runs the
//! agent loop against them, and double-checks the result with an independent
//! pipeline run:
//!
//! - [`scenarios`] and [`baseline`]: what gets broken, and how.
//! - [`provision`]: fresh `workspaces/test_<scenario>` directories.
//! - [`orchestrate`]: provision, run, re-check, produce a [`verdict::RunVerdict`].
//! - [`results`] and [`report`]: persisted runs and their aggregation.

pub mod baseline;
pub mod cli;
pub mod orchestrate;
pub mod provision;
pub mod report;
pub mod results;
pub mod scenarios;
pub mod verdict;
