//! Step graph types loaded from the workflow document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entry step used when the graph has no unique root.
pub const DEFAULT_ENTRY_STEP: &str = "Analysis";

/// Top-level workflow document (`workflow.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDocument {
    /// Overrides the configured default entry step for this document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_entry_step: Option<String>,
    pub workflow: BTreeMap<String, StepDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    /// Filled from the document key when the graph is built.
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub responsible_department: String,
    pub action: Action,
    #[serde(default)]
    pub next_steps: NextSteps,
}

impl StepDefinition {
    /// Name of the step to run after this one succeeds, if any.
    pub fn success_step(&self) -> Option<&str> {
        self.next_steps
            .success_step
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionKind {
    #[serde(rename = "handler", alias = "class_execution")]
    Handler,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Registry key of the handler that runs this step.
    pub handler: String,
    #[serde(default)]
    pub agent_config: AgentConfig,
    /// Context key whose value is passed to the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,
    /// Context key the handler's output is stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextSteps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_step: Option<String>,
}

/// Per-step handler settings (`action.agent_config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory under the codebase root that this step writes into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    /// Version log category; defaults to `<step>_logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_category: Option<String>,
    /// Prompt template (minijinja).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Template used when a response has to be regenerated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<String>,
    /// Opaque options forwarded to the generator.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generation: BTreeMap<String, serde_json::Value>,
}

/// Named steps plus the entry fallback, read-only during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowGraph {
    steps: BTreeMap<String, StepDefinition>,
    default_entry: String,
}

impl WorkflowGraph {
    pub fn new(steps: impl IntoIterator<Item = StepDefinition>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .map(|step| (step.name.clone(), step))
                .collect(),
            default_entry: DEFAULT_ENTRY_STEP.to_string(),
        }
    }

    pub fn from_document(document: WorkflowDocument) -> Self {
        Self::from_document_with_default(document, DEFAULT_ENTRY_STEP)
    }

    /// Build from a document; `fallback` is the default entry step unless the
    /// document names its own.
    pub fn from_document_with_default(document: WorkflowDocument, fallback: &str) -> Self {
        let default_entry = document
            .default_entry_step
            .unwrap_or_else(|| fallback.to_string());
        let steps = document.workflow.into_iter().map(|(name, mut step)| {
            step.name = name;
            step
        });
        Self::new(steps).with_default_entry(default_entry)
    }

    pub fn with_default_entry(mut self, name: impl Into<String>) -> Self {
        self.default_entry = name.into();
        self
    }

    pub fn default_entry(&self) -> &str {
        &self.default_entry
    }

    pub fn get(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Steps in name order.
    pub fn steps(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Two-step workflow written by `agentflow init`.
pub fn default_document() -> WorkflowDocument {
    let analysis = StepDefinition {
        name: String::new(),
        description: "Analyze and document the requirements.".to_string(),
        responsible_department: "ANALYSIS".to_string(),
        action: Action {
            kind: ActionKind::Handler,
            handler: "file_generation".to_string(),
            agent_config: AgentConfig {
                base_dir: Some("Docs".to_string()),
                log_category: Some("analysis_logs".to_string()),
                ..AgentConfig::default()
            },
            input_key: Some("requirements".to_string()),
            output_key: Some("analysis".to_string()),
        },
        next_steps: NextSteps {
            success_step: Some("Development".to_string()),
        },
    };
    let development = StepDefinition {
        name: String::new(),
        description: "Implement the analyzed requirements.".to_string(),
        responsible_department: "DEVELOPMENT".to_string(),
        action: Action {
            kind: ActionKind::Handler,
            handler: "file_generation".to_string(),
            agent_config: AgentConfig {
                base_dir: Some("Code".to_string()),
                log_category: Some("development_logs".to_string()),
                ..AgentConfig::default()
            },
            input_key: Some("analysis".to_string()),
            output_key: Some("implementation".to_string()),
        },
        next_steps: NextSteps::default(),
    };
    WorkflowDocument {
        default_entry_step: None,
        workflow: BTreeMap::from([
            ("Analysis".to_string(), analysis),
            ("Development".to_string(), development),
        ]),
    }
}
