//! Project configuration stored in `agentflow.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::entry::EntryPolicy;
use crate::io::retry::RetryPolicy;
use crate::workflow::DEFAULT_ENTRY_STEP;

pub const CONFIG_FILE: &str = "agentflow.toml";

/// Project configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults below;
/// relative paths are resolved against the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentflowConfig {
    /// Workflow document, relative to the project root.
    pub workflow_path: String,

    /// Root directory generated files are materialized under.
    pub codebase_dir: String,

    /// Directory holding per-category version logs.
    pub logs_dir: String,

    /// Entry step used when the workflow has no unique root step.
    pub default_entry_step: String,

    pub entry_policy: EntryPolicy,

    pub retry: RetryConfig,

    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per generation call and per regeneration loop (first try included).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for every later retry.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay. Unset means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10_000,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: self.max_delay_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that reads a prompt on stdin and prints the response on stdout.
    pub command: Vec<String>,
    /// Wall-clock budget for one generation call.
    pub timeout_secs: u64,
    /// Responses beyond this many bytes are truncated.
    pub output_limit_bytes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for AgentflowConfig {
    fn default() -> Self {
        Self {
            workflow_path: "workflow.toml".to_string(),
            codebase_dir: "Codebase".to_string(),
            logs_dir: "Logs".to_string(),
            default_entry_step: DEFAULT_ENTRY_STEP.to_string(),
            entry_policy: EntryPolicy::default(),
            retry: RetryConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl AgentflowConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("workflow_path", &self.workflow_path),
            ("codebase_dir", &self.codebase_dir),
            ("logs_dir", &self.logs_dir),
            ("default_entry_step", &self.default_entry_step),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if let Some(max) = self.retry.max_delay_ms
            && max < self.retry.base_delay_ms
        {
            return Err(anyhow!("retry.max_delay_ms must be >= retry.base_delay_ms"));
        }
        if self.generator.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        if self.generator.output_limit_bytes == 0 {
            return Err(anyhow!("generator.output_limit_bytes must be > 0"));
        }
        if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        Ok(())
    }

    /// Resolve configured locations against `root`.
    pub fn paths(&self, root: &Path) -> ProjectPaths {
        ProjectPaths {
            root: root.to_path_buf(),
            config_path: root.join(CONFIG_FILE),
            workflow_path: root.join(&self.workflow_path),
            codebase_dir: root.join(&self.codebase_dir),
            logs_dir: root.join(&self.logs_dir),
        }
    }
}

/// Canonical locations for one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub workflow_path: PathBuf,
    pub codebase_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentflowConfig> {
    if !path.exists() {
        let cfg = AgentflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentflowConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        let mut cfg = AgentflowConfig::default();
        cfg.entry_policy = EntryPolicy::Strict;
        cfg.retry.max_delay_ms = Some(60_000);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "codebase_dir = \"out\"\n[retry]\nmax_attempts = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.codebase_dir, "out");
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay_ms, 10_000);
        assert_eq!(cfg.logs_dir, "Logs");
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut cfg = AgentflowConfig::default();
        cfg.retry.max_attempts = 0;
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn paths_resolve_against_root() {
        let paths = AgentflowConfig::default().paths(Path::new("/proj"));
        assert_eq!(paths.codebase_dir, Path::new("/proj/Codebase"));
        assert_eq!(paths.logs_dir, Path::new("/proj/Logs"));
        assert_eq!(paths.workflow_path, Path::new("/proj/workflow.toml"));
    }
}
