//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and step graphs and return deterministic outputs suitable for tests.

pub mod backoff;
pub mod clean;
pub mod entry;
pub mod extract;
pub mod invariants;
pub mod paths;
pub mod types;
