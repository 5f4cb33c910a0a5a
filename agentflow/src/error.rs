//! Typed failures of the extraction, materialization and workflow pipeline.
//!
//! Most I/O helpers return `anyhow::Result`; these variants are the ones callers
//! branch on. They travel through `anyhow` and are recovered with
//! `downcast_ref::<PipelineError>()` at the run boundary.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Record with an empty path or empty content, or a path escaping the root.
    /// Dropped with a warning; the batch continues.
    #[error("invalid record '{path}': {reason}")]
    InvalidRecord { path: String, reason: String },

    /// Directory creation, file write, backup or log append failed for one record.
    #[error("write failed for {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// No extraction strategy matched the generated text.
    #[error("no file records found in generated text")]
    ExtractionEmpty,

    /// Records were extracted but none of them could be materialized.
    #[error("none of the {records} extracted records could be written")]
    EmptyBatch { records: usize },

    /// A retried operation failed on every attempt.
    #[error("{operation} failed after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// Malformed workflow document, unknown handler or unresolvable entry step.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn invalid_record(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_keeps_source() {
        let err = PipelineError::write(
            "/tmp/x.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn downcasts_through_anyhow() {
        let err: anyhow::Error = PipelineError::configuration("missing action").into();
        let typed = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(typed, PipelineError::Configuration(_)));
    }
}
