//! I/O helpers: filesystem, child processes and persisted logs.

pub mod config;
pub mod generator;
pub mod init;
pub mod materialize;
pub mod process;
pub mod prompt;
pub mod retry;
pub mod version_log;
pub mod workflow_store;
