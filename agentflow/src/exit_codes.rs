//! Stable exit codes for agentflow CLI commands.

/// Command succeeded or the workflow ran to completion.
pub const OK: i32 = 0;
/// Invalid config, workflow document, entry step or arguments, or any other error.
pub const INVALID: i32 = 1;
/// `agentflow run` stopped because a step failed.
pub const STEP_FAILED: i32 = 2;
/// `agentflow run` stopped because the next step had already run.
pub const CYCLE: i32 = 3;
