//! Entry-step resolution for a workflow graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::workflow::WorkflowGraph;

/// What to do when the graph does not have exactly one root step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicy {
    /// Use the graph's default entry step.
    #[default]
    Fallback,
    /// Refuse to pick; the workflow must have a unique root.
    Strict,
}

/// Steps no other step names as its `success_step`, in name order.
pub fn root_steps(graph: &WorkflowGraph) -> Vec<&str> {
    let referenced: BTreeSet<&str> = graph.steps().filter_map(|s| s.success_step()).collect();
    graph
        .steps()
        .map(|s| s.name.as_str())
        .filter(|name| !referenced.contains(name))
        .collect()
}

/// Pick the step a run starts from.
///
/// A unique root step wins. Otherwise the graph's default entry step is used
/// under [`EntryPolicy::Fallback`] and a configuration error is returned under
/// [`EntryPolicy::Strict`]. The returned name is not checked for existence;
/// callers validate it before executing anything.
pub fn find_entry_step(graph: &WorkflowGraph, policy: EntryPolicy) -> Result<String, PipelineError> {
    let roots = root_steps(graph);
    if let [only] = roots.as_slice() {
        return Ok((*only).to_string());
    }
    let reason = if roots.is_empty() {
        "no step is free of incoming edges".to_string()
    } else {
        format!("multiple root steps: {}", roots.join(", "))
    };
    match policy {
        EntryPolicy::Strict => Err(PipelineError::configuration(format!(
            "cannot determine entry step ({reason})"
        ))),
        EntryPolicy::Fallback => {
            tracing::warn!(
                default = graph.default_entry(),
                %reason,
                "falling back to default entry step"
            );
            Ok(graph.default_entry().to_string())
        }
    }
}
