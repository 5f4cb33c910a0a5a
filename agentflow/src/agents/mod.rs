//! Step handlers and the registry that maps handler names to them.
//!
//! A workflow step names its handler in `action.handler`. The registry builds
//! one [`Handler`] per step from the step's `agent_config`; handlers receive
//! everything else they need (output root, generator, retry controller)
//! through [`StepEnv`], so nothing is global.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::core::extract::Extractor;
use crate::error::PipelineError;
use crate::io::generator::Generator;
use crate::io::retry::RetryController;
use crate::workflow::{AgentConfig, StepDefinition};

pub mod file_generation;
pub mod text_generation;

pub use file_generation::FileGenerationAgent;
pub use text_generation::TextGenerationAgent;

/// Shared resources for one workflow run.
#[derive(Clone, Copy)]
pub struct StepEnv<'a> {
    /// Codebase root; steps write under `root/<base_dir>`.
    pub root: &'a Path,
    pub logs_dir: &'a Path,
    pub generator: &'a dyn Generator,
    pub retry: RetryController<'a>,
    pub extractor: &'a Extractor,
}

/// Executes one step. An empty returned string counts as failure.
pub trait Handler {
    fn execute(&self, env: &StepEnv<'_>, step: &StepDefinition, input: Option<&str>) -> Result<String>;
}

pub type HandlerFactory = Box<dyn Fn(&AgentConfig) -> Result<Box<dyn Handler>, PipelineError>>;

/// Handler names to constructors.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// Registry without any handlers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `file_generation` and `text_generation`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(file_generation::HANDLER_NAME, |config| {
            Ok(Box::new(FileGenerationAgent::from_config(config)?) as Box<dyn Handler>)
        });
        registry.register(text_generation::HANDLER_NAME, |config| {
            Ok(Box::new(TextGenerationAgent::from_config(config)) as Box<dyn Handler>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&AgentConfig) -> Result<Box<dyn Handler>, PipelineError> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the handler for `step`.
    pub fn build(&self, step: &StepDefinition) -> Result<Box<dyn Handler>, PipelineError> {
        let factory = self.factories.get(&step.action.handler).ok_or_else(|| {
            PipelineError::configuration(format!(
                "step {}: unknown handler '{}'",
                step.name, step.action.handler
            ))
        })?;
        factory(&step.action.agent_config).map_err(|err| match err {
            PipelineError::Configuration(message) => {
                PipelineError::configuration(format!("step {}: {message}", step.name))
            }
            other => other,
        })
    }
}

/// Version log category for a step: configured, else `<step>_logs`.
pub fn log_category(step: &StepDefinition) -> String {
    step.action
        .agent_config
        .log_category
        .clone()
        .unwrap_or_else(|| format!("{}_logs", step.name.to_lowercase()))
}
