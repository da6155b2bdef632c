//! Deterministic, pure logic shared by the agent.
//!
//! Core modules are free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod action;
pub mod budget;
pub mod edits;
pub mod observe;
pub mod path;
pub mod types;
