//! Workflow load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::error::PipelineError;
use crate::workflow::{WorkflowDocument, WorkflowGraph};

pub const WORKFLOW_SCHEMA: &str = include_str!("../../schemas/workflow/v1.schema.json");

static VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(WORKFLOW_SCHEMA).expect("workflow schema is valid JSON");
    validator_for(&schema).expect("workflow schema compiles")
});

/// Load and validate a workflow document from disk (schema + invariants).
///
/// `default_entry` applies unless the document sets `default_entry_step`.
/// Every validation failure is a [`PipelineError::Configuration`].
pub fn load_workflow(path: &Path, default_entry: &str) -> Result<WorkflowGraph> {
    let contents = fs::read_to_string(path)
        .map_err(|err| PipelineError::configuration(format!("read {}: {err}", path.display())))?;
    parse_workflow(&contents, default_entry)
        .with_context(|| format!("load workflow {}", path.display()))
}

/// Parse and validate workflow TOML.
pub fn parse_workflow(contents: &str, default_entry: &str) -> Result<WorkflowGraph> {
    let value: Value = toml::from_str(contents)
        .map_err(|err| PipelineError::configuration(format!("parse workflow toml: {err}")))?;
    validate_schema(&value)?;
    let document: WorkflowDocument = serde_json::from_value(value)
        .map_err(|err| PipelineError::configuration(format!("deserialize workflow: {err}")))?;
    let graph = WorkflowGraph::from_document_with_default(document, default_entry);
    validate_graph(&graph)?;
    debug!(steps = graph.len(), "workflow loaded");
    Ok(graph)
}

/// Atomically write a workflow document as TOML.
pub fn write_workflow(path: &Path, document: &WorkflowDocument) -> Result<()> {
    let mut buf = toml::to_string_pretty(document).context("serialize workflow toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("workflow path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))
}

fn validate_schema(document: &Value) -> Result<()> {
    if VALIDATOR.is_valid(document) {
        return Ok(());
    }
    let messages = VALIDATOR
        .iter_errors(document)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(PipelineError::configuration(format!(
        "workflow schema validation failed: {}",
        messages.join("; ")
    ))
    .into())
}

fn validate_graph(graph: &WorkflowGraph) -> Result<()> {
    let errors = validate_invariants(graph);
    if errors.is_empty() {
        return Ok(());
    }
    Err(PipelineError::configuration(format!(
        "workflow invariants failed: {}",
        errors.join("; ")
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{DEFAULT_ENTRY_STEP, default_document};

    fn config_error(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Configuration(_))
        )
    }

    #[test]
    fn load_and_write_workflow_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("workflow.toml");
        write_workflow(&path, &default_document()).expect("write");
        let graph = load_workflow(&path, DEFAULT_ENTRY_STEP).expect("load");
        assert_eq!(graph, WorkflowGraph::from_document(default_document()));
    }

    #[test]
    fn accepts_legacy_action_type() {
        let graph = parse_workflow(
            r#"
[workflow.Analysis]
description = "Analyze"
responsible_department = "ANALYSIS"
action = { type = "class_execution", handler = "text_generation" }
"#,
            DEFAULT_ENTRY_STEP,
        )
        .expect("parse");
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("Analysis").map(|s| s.success_step()), Some(None));
    }

    #[test]
    fn missing_action_is_a_configuration_error() {
        let err = parse_workflow(
            r#"
[workflow.Analysis]
description = "Analyze"
responsible_department = "ANALYSIS"
"#,
            DEFAULT_ENTRY_STEP,
        )
        .expect_err("missing action");
        assert!(config_error(&err));
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn missing_description_is_rejected() {
        let err = parse_workflow(
            r#"
[workflow.Analysis]
responsible_department = "ANALYSIS"
action = { type = "handler", handler = "text_generation" }
"#,
            DEFAULT_ENTRY_STEP,
        )
        .expect_err("missing description");
        assert!(config_error(&err));
    }

    #[test]
    fn dangling_success_step_fails_invariants() {
        let err = parse_workflow(
            r#"
[workflow.Analysis]
description = "Analyze"
responsible_department = "ANALYSIS"
action = { type = "handler", handler = "text_generation" }
next_steps = { success_step = "Nowhere" }
"#,
            DEFAULT_ENTRY_STEP,
        )
        .expect_err("dangling");
        assert!(config_error(&err));
        assert!(err.to_string().contains("invariants failed"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_workflow(
            r#"
[workflow.Analysis]
description = "Analyze"
responsible_department = "ANALYSIS"
action = { type = "handler", handler = "text_generation", retries = 3 }
"#,
            DEFAULT_ENTRY_STEP,
        )
        .expect_err("unknown field");
        assert!(config_error(&err));
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_workflow(&temp.path().join("missing.toml"), DEFAULT_ENTRY_STEP).expect_err("missing");
        assert!(config_error(&err));
    }
}
