//! Stable exit codes for the agent and harness CLIs.

/// The pipeline passes (or the command succeeded).
pub const OK: i32 = 0;
/// Invalid config, arguments, workspace, or another hard error.
pub const INVALID: i32 = 1;
/// The loop stopped without a passing pipeline, or a harness run produced a
/// failing verdict.
pub const EXHAUSTED: i32 = 2;
/// The loop aborted after too many consecutive failed turns.
pub const ABORTED: i32 = 3;
