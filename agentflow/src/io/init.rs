//! Project scaffolding for `agentflow init`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::io::config::{AgentflowConfig, CONFIG_FILE, ProjectPaths, write_config};
use crate::io::workflow_store::write_workflow;
use crate::workflow::default_document;

/// Options for [`init_project`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite an existing config and workflow.
    pub force: bool,
}

/// Write a default `agentflow.toml`, the two-step default workflow and the
/// output directories under `root`.
///
/// Fails if the config or workflow already exists unless `options.force` is set.
/// Existing generated files and logs are never touched.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let config = AgentflowConfig::default();
    let paths = config.paths(root);
    if !options.force {
        for existing in [&paths.config_path, &paths.workflow_path] {
            if existing.exists() {
                return Err(anyhow!(
                    "agentflow init: {} already exists (use --force to overwrite)",
                    existing.display()
                ));
            }
        }
    }

    write_config(&root.join(CONFIG_FILE), &config)?;
    write_workflow(&paths.workflow_path, &default_document())?;
    for dir in [&paths.codebase_dir, &paths.logs_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    info!(root = %root.display(), "initialized project");
    Ok(paths)
}
