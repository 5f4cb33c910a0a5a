//! Semantic workflow invariants not expressible via JSON Schema.

use std::collections::BTreeSet;

use crate::workflow::{StepDefinition, WorkflowGraph};

/// Check semantic invariants not expressible in JSON Schema:
/// - at least one step
/// - non-blank `description` and `responsible_department`
/// - non-blank handler name and context keys
/// - every `success_step` names a step in the graph
pub fn validate_invariants(graph: &WorkflowGraph) -> Vec<String> {
    let mut errors = Vec::new();
    if graph.is_empty() {
        errors.push("workflow defines no steps".to_string());
    }
    for step in graph.steps() {
        validate_step(graph, step, &mut errors);
    }
    errors
}

fn validate_step(graph: &WorkflowGraph, step: &StepDefinition, errors: &mut Vec<String>) {
    let name = step.name.as_str();
    if name.trim().is_empty() {
        errors.push("step name must not be blank".to_string());
    }
    if step.description.trim().is_empty() {
        errors.push(format!("{name}: description is required"));
    }
    if step.responsible_department.trim().is_empty() {
        errors.push(format!("{name}: responsible_department is required"));
    }
    if step.action.handler.trim().is_empty() {
        errors.push(format!("{name}: action.handler is required"));
    }
    for (field, key) in [
        ("input_key", &step.action.input_key),
        ("output_key", &step.action.output_key),
    ] {
        if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            errors.push(format!("{name}: action.{field} must not be blank"));
        }
    }
    if let Some(next) = step.success_step().filter(|next| !graph.contains(next)) {
        errors.push(format!("{name}: success_step '{next}' is not a defined step"));
    }
}

/// Handler names used by the graph that `is_known` rejects, sorted and deduplicated.
pub fn unknown_handlers(graph: &WorkflowGraph, is_known: impl Fn(&str) -> bool) -> Vec<String> {
    graph
        .steps()
        .map(|step| step.action.handler.as_str())
        .filter(|handler| !is_known(handler))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{WorkflowGraph, default_document};

    fn default_graph() -> WorkflowGraph {
        WorkflowGraph::from_document(default_document())
    }

    #[test]
    fn default_workflow_is_valid() {
        assert!(validate_invariants(&default_graph()).is_empty());
    }

    #[test]
    fn empty_graph_is_rejected() {
        let errors = validate_invariants(&WorkflowGraph::new(Vec::new()));
        assert_eq!(errors, vec!["workflow defines no steps".to_string()]);
    }

    #[test]
    fn reports_missing_fields_and_dangling_successor() {
        let mut doc = default_document();
        let analysis = doc.workflow.get_mut("Analysis").expect("step");
        analysis.description = " ".to_string();
        analysis.responsible_department.clear();
        analysis.next_steps.success_step = Some("Deploy".to_string());
        let errors = validate_invariants(&WorkflowGraph::from_document(doc));
        assert!(errors.iter().any(|e| e.contains("description is required")));
        assert!(errors.iter().any(|e| e.contains("responsible_department is required")));
        assert!(errors.iter().any(|e| e.contains("'Deploy'")));
    }

    #[test]
    fn unknown_handlers_are_deduplicated() {
        let unknown = unknown_handlers(&default_graph(), |name| name == "text_generation");
        assert_eq!(unknown, vec!["file_generation".to_string()]);
    }
}
