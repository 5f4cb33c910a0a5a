//! Write extracted records under a root directory and record their versions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::core::clean::{clean_content, clean_record_path};
use crate::core::paths::{join_within, normalize_path};
use crate::core::types::{FileRecord, Operation};
use crate::error::PipelineError;
use crate::io::version_log::{AppendOutcome, VersionedLog};

/// A record that reached disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// Absolute destination.
    pub path: PathBuf,
    /// Destination relative to the materializer root, `/`-separated.
    pub relative: String,
    pub operation: Operation,
    pub backup: Option<PathBuf>,
    pub version: u32,
    /// False when the content matched an earlier logged version.
    pub logged: bool,
}

/// Turns [`FileRecord`]s into files under `root`, one category log per instance.
#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
    log: VersionedLog,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>, log: VersionedLog) -> Self {
        Self {
            root: root.into(),
            log,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log(&self) -> &VersionedLog {
        &self.log
    }

    /// Map a generated path onto a destination inside the root.
    ///
    /// Absolute paths already under the root keep their position; other
    /// absolute paths are treated as root-relative. Paths that climb out of
    /// the root are rejected.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, PipelineError> {
        let cleaned = clean_record_path(raw);
        if cleaned.is_empty() {
            return Err(PipelineError::invalid_record(raw, "empty path"));
        }
        let candidate = Path::new(&cleaned);
        let relative = candidate.strip_prefix(&self.root).unwrap_or(candidate);
        let resolved = join_within(&self.root, relative)
            .ok_or_else(|| PipelineError::invalid_record(raw, "path escapes the output root"))?;
        if resolved == self.root {
            return Err(PipelineError::invalid_record(raw, "path names the output root"));
        }
        Ok(resolved)
    }

    /// Clean, resolve, back up, write, verify and log one record.
    #[instrument(skip_all, fields(path = %record.path))]
    pub fn materialize(&self, record: &FileRecord) -> Result<Materialized, PipelineError> {
        let content = clean_content(&record.content);
        if content.trim().is_empty() {
            return Err(PipelineError::invalid_record(&record.path, "empty content"));
        }
        let dest = self.resolve(&record.path)?;
        let relative = self.relative(&dest);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| PipelineError::write(parent, err))?;
        }

        let existed = dest.is_file();
        let operation = if record.is_modification || existed {
            Operation::Modification
        } else {
            Operation::Creation
        };
        let backup = if record.is_modification && existed {
            let backup = backup_path(&dest, &Local::now().format("%Y%m%d_%H%M%S").to_string());
            fs::copy(&dest, &backup).map_err(|err| PipelineError::write(&backup, err))?;
            debug!(backup = %backup.display(), "backed up previous version");
            Some(backup)
        } else {
            None
        };

        write_verified(&dest, &content)?;

        let description = record.description.as_deref().unwrap_or_default();
        let outcome = self
            .log
            .append(Path::new(&relative), description, operation, &content)
            .map_err(|err| PipelineError::write(self.log.path(), err))?;

        info!(
            file = %relative,
            operation = operation.as_str(),
            version = outcome.version(),
            "materialized file"
        );
        Ok(Materialized {
            path: dest,
            relative,
            operation,
            backup,
            version: outcome.version(),
            logged: matches!(outcome, AppendOutcome::Recorded(_)),
        })
    }

    /// Materialize every record, collecting per-record failures instead of stopping.
    pub fn materialize_all(
        &self,
        records: &[FileRecord],
    ) -> (Vec<Materialized>, Vec<(String, PipelineError)>) {
        let mut written = Vec::new();
        let mut failed = Vec::new();
        for record in records {
            match self.materialize(record) {
                Ok(done) => written.push(done),
                Err(err) => {
                    warn!(path = %record.path, err = %err, "skipping record");
                    failed.push((record.path.clone(), err));
                }
            }
        }
        (written, failed)
    }

    /// Read a file under the root. `Ok(None)` when it does not exist.
    pub fn read_file(&self, path: &str) -> Result<Option<String>> {
        let dest = self.resolve(path)?;
        if !dest.is_file() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&dest).with_context(|| format!("read {}", dest.display()))?;
        Ok(Some(contents))
    }

    /// Files under the root (or one of its subdirectories), relative and sorted.
    ///
    /// Backups and temp files are skipped.
    pub fn list_files(&self, subdir: Option<&str>) -> Result<Vec<String>> {
        let start = match subdir {
            Some(dir) => self.resolve(dir)?,
            None => self.root.clone(),
        };
        let mut files = Vec::new();
        if start.is_dir() {
            collect_files(&start, &mut files)?;
        }
        let mut relative: Vec<String> = files
            .iter()
            .filter(|path| !is_scratch_file(path))
            .map(|path| self.relative(path))
            .collect();
        relative.sort();
        Ok(relative)
    }

    /// Delete a file under the root, optionally keeping a sibling backup.
    ///
    /// Returns false when the file does not exist.
    pub fn delete_file(&self, path: &str, backup: bool) -> Result<bool> {
        let dest = self.resolve(path)?;
        if !dest.is_file() {
            return Ok(false);
        }
        if backup {
            let target = backup_path(&dest, &Local::now().format("%Y%m%d_%H%M%S").to_string());
            fs::copy(&dest, &target).with_context(|| format!("back up {}", dest.display()))?;
        }
        fs::remove_file(&dest).with_context(|| format!("remove {}", dest.display()))?;
        info!(file = %self.relative(&dest), backup, "deleted file");
        Ok(true)
    }

    /// Indented tree of every file under the root.
    pub fn structure_summary(&self) -> Result<String> {
        let files = self.list_files(None)?;
        let mut out = String::new();
        let mut open: Vec<&str> = Vec::new();
        for file in &files {
            let parts: Vec<&str> = file.split('/').collect();
            let Some((name, dirs)) = parts.split_last() else {
                continue;
            };
            let shared = open
                .iter()
                .zip(dirs.iter())
                .take_while(|(a, b)| a == b)
                .count();
            open.truncate(shared);
            for dir in &dirs[shared..] {
                out.push_str(&"  ".repeat(open.len()));
                out.push_str(dir);
                out.push_str("/\n");
                open.push(*dir);
            }
            out.push_str(&"  ".repeat(open.len()));
            out.push_str(name);
            out.push('\n');
        }
        Ok(out)
    }

    fn relative(&self, path: &Path) -> String {
        normalize_path(path.strip_prefix(&self.root).unwrap_or(path))
    }
}

/// Sibling backup name: `<stem>_<timestamp><ext>.bak`.
pub fn backup_path(original: &Path, timestamp: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    original.with_file_name(format!("{stem}_{timestamp}{ext}.bak"))
}

fn write_verified(dest: &Path, content: &str) -> Result<(), PipelineError> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dest.with_file_name(format!(".{name}.tmp"));
    fs::write(&tmp, content).map_err(|err| PipelineError::write(&tmp, err))?;
    if let Err(err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::write(dest, err));
    }

    let written = fs::read_to_string(dest).map_err(|err| PipelineError::write(dest, err))?;
    if written != content {
        return Err(PipelineError::write(
            dest,
            io::Error::other("content read back does not match what was written"),
        ));
    }
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn is_scratch_file(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy();
    name.ends_with(".bak") || (name.starts_with('.') && name.ends_with(".tmp"))
}
