//! Multi-step generation pipeline that turns generated text into files.
//!
//! A workflow is a graph of named steps. Each step runs a handler that prompts
//! a text generator; file-producing handlers pull `FILE:` blocks out of the
//! response, write them under the codebase root and record every version in a
//! per-category log. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (extraction, cleaning, path
//!   normalization, backoff, entry-step resolution, workflow invariants).
//! - **[`io`]**: Side-effecting operations (config, workflow documents,
//!   generator processes, materialization, version logs).
//!
//! Orchestration modules ([`batch`], [`agents`], [`executor`]) combine the two
//! to implement CLI commands.

pub mod agents;
pub mod batch;
pub mod core;
pub mod error;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
