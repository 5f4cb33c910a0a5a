//! Shared record types for extraction, materialization and the version log.
//!
//! These types define stable contracts between the extractor, the materializer
//! and the persisted log. They carry no I/O and serialize deterministically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file block recovered from generated text.
///
/// Produced by the extractor and consumed by the materializer. Never persisted
/// directly; only its materialized effect is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path as written by the generator, trimmed but otherwise unresolved.
    pub path: String,
    /// Value of the `Type:` header or the fence language, when present.
    pub declared_type: Option<String>,
    /// Value of the `Description:` header, when present.
    pub description: Option<String>,
    /// Trimmed content. May still carry fence decoration; see `core::clean`.
    pub content: String,
    /// True only when the block was explicitly marked as a modification.
    pub is_modification: bool,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            declared_type: None,
            description: None,
            content: content.into(),
            is_modification: false,
        }
    }
}

/// Kind of write recorded in the version log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Creation,
    Modification,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Creation => "creation",
            Operation::Modification => "modification",
        }
    }
}

/// One immutable entry of a category log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Normalized path (see `core::paths::normalize_path`).
    pub file_path: String,
    pub operation: Operation,
    pub description: String,
    pub file_size: u64,
    /// 1-based, strictly increasing per `file_path`.
    pub version: u32,
    /// Hex SHA-256 of the logged content.
    pub content_hash: String,
}
