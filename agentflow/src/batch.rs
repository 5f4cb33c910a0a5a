//! One generated response in, files on disk out.
//!
//! Extraction and materialization run together; when a response yields no
//! usable files and a regeneration callback is available, the response is
//! regenerated under the retry controller's attempt and backoff limits.

use tracing::{info, instrument, warn};

use crate::core::extract::Extractor;
use crate::error::PipelineError;
use crate::io::materialize::{Materialized, Materializer};
use crate::io::retry::{RetryController, Substantive};

/// Records that could not be materialized, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub path: String,
    pub reason: String,
}

/// Result of processing one response.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The response the files were taken from.
    pub response: String,
    /// Extraction strategy that matched.
    pub strategy: &'static str,
    pub written: Vec<Materialized>,
    pub skipped: Vec<SkippedRecord>,
    /// Number of responses processed, 1 when the first one was usable.
    pub attempts: u32,
}

impl Substantive for BatchOutcome {
    fn is_blank(&self) -> bool {
        self.written.is_empty()
    }
}

/// Extract records from `text` and materialize each one.
///
/// Per-record failures are collected in [`BatchOutcome::skipped`]. Fails with
/// [`PipelineError::ExtractionEmpty`] when nothing was recognized and with
/// [`PipelineError::EmptyBatch`] when nothing could be written.
#[instrument(skip_all, fields(len = text.len()))]
pub fn process_text(
    text: &str,
    extractor: &Extractor,
    materializer: &Materializer,
) -> Result<BatchOutcome, PipelineError> {
    let Some((strategy, records)) = extractor.extract_named(text) else {
        warn!("no file records in response");
        return Err(PipelineError::ExtractionEmpty);
    };
    let (written, failed) = materializer.materialize_all(&records);
    if written.is_empty() {
        return Err(PipelineError::EmptyBatch {
            records: records.len(),
        });
    }
    let skipped = failed
        .into_iter()
        .map(|(path, err)| SkippedRecord {
            path,
            reason: err.to_string(),
        })
        .collect::<Vec<_>>();
    info!(
        strategy,
        written = written.len(),
        skipped = skipped.len(),
        "processed response"
    );
    Ok(BatchOutcome {
        response: text.to_string(),
        strategy,
        written,
        skipped,
        attempts: 1,
    })
}

/// Process `text`, regenerating the response while it yields no files.
///
/// `regenerate` is called before every attempt after the first. Without a
/// callback the first failure is returned as is. When every attempt fails the
/// error is [`PipelineError::RetryExhausted`].
pub fn process_with_regeneration<F>(
    text: String,
    extractor: &Extractor,
    materializer: &Materializer,
    retry: &RetryController<'_>,
    regenerate: Option<F>,
) -> Result<BatchOutcome, PipelineError>
where
    F: FnMut() -> Result<String, PipelineError>,
{
    let Some(mut regenerate) = regenerate else {
        return process_text(&text, extractor, materializer);
    };
    let mut pending = Some(text);
    retry.with_retry("file processing", |attempt| {
        let response = match pending.take() {
            Some(first) => first,
            None => {
                info!(attempt, "regenerating response");
                regenerate()?
            }
        };
        match process_text(&response, extractor, materializer) {
            Ok(mut outcome) => {
                outcome.attempts = attempt;
                Ok(outcome)
            }
            Err(err) => Err(err.into()),
        }
    })
}
