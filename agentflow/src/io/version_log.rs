//! Append-only, content-hashed version history per log category.
//!
//! Each category is one pretty-printed JSON array at
//! `<logs_dir>/<category>/<category>.json`. Appending a file whose content hash
//! matches a prior entry for the same path is a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::core::paths::{content_hash, normalize_path};
use crate::core::types::{LogEntry, Operation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedLog {
    path: PathBuf,
}

/// Result of [`VersionedLog::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Recorded(LogEntry),
    /// Content identical to an earlier version of the same path; carries the
    /// newest entry with that content.
    Unchanged(LogEntry),
}

impl AppendOutcome {
    pub fn version(&self) -> u32 {
        match self {
            Self::Recorded(entry) | Self::Unchanged(entry) => entry.version,
        }
    }
}

impl VersionedLog {
    pub fn new(logs_dir: &Path, category: &str) -> Self {
        Self {
            path: logs_dir.join(category).join(format!("{category}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in append order. Missing or unreadable logs read as empty.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Record a new version of `file_path` unless its content is already logged.
    #[instrument(skip_all, fields(log = %self.path.display(), file = %file_path.display()))]
    pub fn append(
        &self,
        file_path: &Path,
        description: &str,
        operation: Operation,
        content: &str,
    ) -> Result<AppendOutcome> {
        let key = normalize_path(file_path);
        let hash = content_hash(content);
        let mut entries = match self.load()? {
            Some(entries) => entries,
            None => {
                self.preserve_corrupt()?;
                Vec::new()
            }
        };

        let prior: Vec<&LogEntry> = entries.iter().filter(|e| e.file_path == key).collect();
        let latest = prior.iter().map(|e| e.version).max().unwrap_or(0);
        if let Some(matching) = prior
            .iter()
            .filter(|e| e.content_hash == hash)
            .max_by_key(|e| e.version)
        {
            debug!(version = matching.version, "content unchanged, skipping log entry");
            return Ok(AppendOutcome::Unchanged((*matching).clone()));
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            file_path: key,
            operation,
            description: description.to_string(),
            file_size: content.len() as u64,
            version: latest + 1,
            content_hash: hash,
        };
        entries.push(entry.clone());
        self.store(&entries)?;
        debug!(version = entry.version, "recorded log entry");
        Ok(AppendOutcome::Recorded(entry))
    }

    /// Entries for one path, oldest first.
    pub fn history(&self, file_path: &Path) -> Result<Vec<LogEntry>> {
        let key = normalize_path(file_path);
        let mut entries: Vec<LogEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| e.file_path == key)
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    /// Most recent entries across all paths, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.entries()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// `Ok(None)` when the file exists but is not a valid log.
    fn load(&self) -> Result<Option<Vec<LogEntry>>> {
        if !self.path.exists() {
            return Ok(Some(Vec::new()));
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(Some(entries)),
            Err(err) => {
                warn!(log = %self.path.display(), err = %err, "unreadable version log");
                Ok(None)
            }
        }
    }

    fn preserve_corrupt(&self) -> Result<()> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        let target = PathBuf::from(name);
        fs::rename(&self.path, &target).with_context(|| {
            format!("move {} to {}", self.path.display(), target.display())
        })?;
        warn!(preserved = %target.display(), "starting a fresh version log");
        Ok(())
    }

    fn store(&self, entries: &[LogEntry]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("log path missing parent {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let mut buf = serde_json::to_string_pretty(entries).context("serialize version log")?;
        buf.push('\n');
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))
    }
}
