//! Walk the step graph from the entry step along `success_step` edges.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use crate::agents::{HandlerRegistry, StepEnv};
use crate::core::entry::{EntryPolicy, find_entry_step};
use crate::core::invariants::unknown_handlers;
use crate::error::PipelineError;
use crate::workflow::WorkflowGraph;

/// Step outputs keyed by `output_key`, plus the steps executed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    data: BTreeMap<String, String>,
    executed: Vec<String>,
    seen: BTreeSet<String>,
}

impl ExecutionContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Executed steps in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn has_executed(&self, step: &str) -> bool {
        self.seen.contains(step)
    }

    fn mark_executed(&mut self, step: &str) {
        if self.seen.insert(step.to_string()) {
            self.executed.push(step.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Emitted once per attempted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub department: String,
    pub status: StepStatus,
    /// Output length on success, error message on failure.
    pub detail: String,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// The last step had no successor.
    Completed,
    /// The next step had already run in this execution.
    CycleDetected { step: String, from: String },
    /// A step failed or named a successor that does not exist.
    StepFailed { step: String, error: String },
}

/// Summary of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub entry: String,
    pub executed: Vec<String>,
    pub stop: RunStop,
    /// Output of the last successful step.
    pub output: Option<String>,
    pub context: ExecutionContext,
}

/// Options for [`run_workflow`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub entry_policy: EntryPolicy,
    /// Start here instead of resolving the entry step.
    pub start: Option<String>,
    /// Seeded under the first step's `input_key`.
    pub input: Option<String>,
}

/// Executes steps of one graph with one set of shared resources.
pub struct WorkflowExecutor<'a> {
    graph: &'a WorkflowGraph,
    registry: &'a HandlerRegistry,
    env: StepEnv<'a>,
    context: ExecutionContext,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(graph: &'a WorkflowGraph, registry: &'a HandlerRegistry, env: StepEnv<'a>) -> Self {
        Self {
            graph,
            registry,
            env,
            context: ExecutionContext::default(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    /// Check every handler reference and handler config before anything runs.
    pub fn preflight(&self) -> Result<(), PipelineError> {
        check_handlers(self.graph, self.registry)
    }

    /// Run one step: read its input, execute its handler, store its output.
    ///
    /// An empty output is a failure. On failure the context is unchanged.
    #[instrument(skip_all, fields(step = name))]
    pub fn execute_step(&mut self, name: &str) -> Result<String> {
        let Some(step) = self.graph.get(name) else {
            bail!(PipelineError::configuration(format!("unknown step '{name}'")));
        };
        let handler = self.registry.build(step)?;
        let input = step
            .action
            .input_key
            .as_deref()
            .and_then(|key| self.context.get(key));
        if input.is_none()
            && let Some(key) = step.action.input_key.as_deref()
        {
            warn!(input_key = key, "input key not present in context");
        }

        let output = handler.execute(&self.env, step, input)?;
        if output.trim().is_empty() {
            bail!("step {name} produced no output");
        }

        if let Some(key) = step.action.output_key.as_deref() {
            self.context.insert(key, output.clone());
        }
        self.context.mark_executed(name);
        info!(len = output.len(), "step succeeded");
        Ok(output)
    }

    /// Execute from `start` until a step has no successor, fails, or would repeat.
    pub fn execute_workflow<F: FnMut(&StepReport)>(&mut self, start: &str, mut on_step: F) -> RunOutcome {
        let mut current = start.to_string();
        let mut output = None;
        let stop = loop {
            let department = self
                .graph
                .get(&current)
                .map(|s| s.responsible_department.clone())
                .unwrap_or_default();
            match self.execute_step(&current) {
                Ok(text) => {
                    on_step(&StepReport {
                        step: current.clone(),
                        department,
                        status: StepStatus::Succeeded,
                        detail: format!("{} bytes", text.len()),
                    });
                    output = Some(text);
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(step = %current, err = %error, "step failed");
                    on_step(&StepReport {
                        step: current.clone(),
                        department,
                        status: StepStatus::Failed,
                        detail: error.clone(),
                    });
                    break RunStop::StepFailed {
                        step: current,
                        error,
                    };
                }
            }

            let next = self.graph.get(&current).and_then(|s| s.success_step());
            let Some(next) = next else {
                break RunStop::Completed;
            };
            if !self.graph.contains(next) {
                break RunStop::StepFailed {
                    error: format!("success step '{next}' is not defined"),
                    step: current,
                };
            }
            if self.context.has_executed(next) {
                warn!(step = next, from = %current, "cycle detected, stopping");
                break RunStop::CycleDetected {
                    step: next.to_string(),
                    from: current,
                };
            }
            current = next.to_string();
        };

        info!(executed = self.context.executed().len(), stop = ?stop, "workflow finished");
        RunOutcome {
            entry: start.to_string(),
            executed: self.context.executed().to_vec(),
            stop,
            output,
            context: self.context.clone(),
        }
    }
}

/// Every step names a registered handler that accepts its `agent_config`.
pub fn check_handlers(graph: &WorkflowGraph, registry: &HandlerRegistry) -> Result<(), PipelineError> {
    let unknown = unknown_handlers(graph, |name| registry.contains(name));
    if !unknown.is_empty() {
        return Err(PipelineError::configuration(format!(
            "unknown handler(s): {}",
            unknown.join(", ")
        )));
    }
    for step in graph.steps() {
        registry.build(step)?;
    }
    Ok(())
}

/// Resolve the entry step, validate handlers, seed the input and run.
///
/// Configuration problems are returned before any step executes; step
/// failures are reported through [`RunOutcome::stop`].
pub fn run_workflow<F: FnMut(&StepReport)>(
    graph: &WorkflowGraph,
    registry: &HandlerRegistry,
    env: StepEnv<'_>,
    options: &RunOptions,
    on_step: F,
) -> Result<RunOutcome, PipelineError> {
    let entry = match &options.start {
        Some(start) => start.clone(),
        None => find_entry_step(graph, options.entry_policy)?,
    };
    let Some(entry_step) = graph.get(&entry) else {
        return Err(PipelineError::configuration(format!(
            "entry step '{entry}' is not defined"
        )));
    };

    let mut executor = WorkflowExecutor::new(graph, registry, env);
    executor.preflight()?;
    if let Some(input) = &options.input {
        match entry_step.action.input_key.as_deref() {
            Some(key) => executor.context_mut().insert(key, input.clone()),
            None => warn!(step = %entry, "entry step has no input_key, input ignored"),
        }
    }
    info!(entry = %entry, steps = graph.len(), "starting workflow");
    Ok(executor.execute_workflow(&entry, on_step))
}
