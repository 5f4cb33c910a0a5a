//! Test-only helpers: step builders, scripted generators and a throwaway project.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::agents::{Handler, HandlerRegistry, StepEnv};
use crate::core::extract::Extractor;
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::retry::{RetryController, RetryPolicy, Sleeper};
use crate::workflow::{
    Action, ActionKind, AgentConfig, NextSteps, StepDefinition, WorkflowGraph,
};

/// Handler name served by [`static_registry`].
pub const STATIC_HANDLER: &str = "static";

/// Step with deterministic text fields, the static handler and an optional successor.
pub fn chain_step(name: &str, next: Option<&str>) -> StepDefinition {
    StepDefinition {
        name: name.to_string(),
        description: format!("{name} description"),
        responsible_department: name.to_uppercase(),
        action: Action {
            kind: ActionKind::Handler,
            handler: STATIC_HANDLER.to_string(),
            agent_config: AgentConfig::default(),
            input_key: None,
            output_key: None,
        },
        next_steps: NextSteps {
            success_step: next.map(str::to_string),
        },
    }
}

/// `file_generation` step writing under `base_dir`.
pub fn file_step(name: &str, base_dir: &str, next: Option<&str>) -> StepDefinition {
    let mut step = chain_step(name, next);
    step.action.handler = "file_generation".to_string();
    step.action.agent_config.base_dir = Some(base_dir.to_string());
    step
}

pub fn graph_of(steps: Vec<StepDefinition>) -> WorkflowGraph {
    WorkflowGraph::new(steps)
}

/// Generator that replays a fixed script of responses (`Err` entries fail).
///
/// Fails once the script is exhausted.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: RefCell<VecDeque<Result<String, String>>>,
    requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: RefCell::new(
                script
                    .into_iter()
                    .map(|entry| entry.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        match self.script.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("generator script exhausted")),
        }
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Temporary codebase and log directories plus the pieces a [`StepEnv`] borrows.
pub struct TestEnv {
    _temp: tempfile::TempDir,
    root: PathBuf,
    logs_dir: PathBuf,
    sleeper: RecordingSleeper,
    extractor: Extractor,
    policy: RetryPolicy,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("Codebase");
        let logs_dir = temp.path().join("Logs");
        Self {
            _temp: temp,
            root,
            logs_dir,
            sleeper: RecordingSleeper::default(),
            extractor: Extractor::default(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn sleeper(&self) -> &RecordingSleeper {
        &self.sleeper
    }

    pub fn env<'a>(&'a self, generator: &'a dyn Generator) -> StepEnv<'a> {
        StepEnv {
            root: &self.root,
            logs_dir: &self.logs_dir,
            generator,
            retry: RetryController::new(self.policy, &self.sleeper),
            extractor: &self.extractor,
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs seen by the static handler, per step.
#[derive(Clone, Default)]
pub struct StaticCalls(Rc<RefCell<BTreeMap<String, Vec<Option<String>>>>>);

impl StaticCalls {
    pub fn inputs(&self, step: &str) -> Vec<Option<String>> {
        self.0.borrow().get(step).cloned().unwrap_or_default()
    }
}

struct StaticHandler {
    outputs: Rc<BTreeMap<String, String>>,
    calls: StaticCalls,
}

impl Handler for StaticHandler {
    fn execute(&self, _env: &StepEnv<'_>, step: &StepDefinition, input: Option<&str>) -> Result<String> {
        self.calls
            .0
            .borrow_mut()
            .entry(step.name.clone())
            .or_default()
            .push(input.map(str::to_string));
        self.outputs
            .get(&step.name)
            .cloned()
            .ok_or_else(|| anyhow!("no static output for step {}", step.name))
    }
}

/// Registry whose `static` handler returns a fixed output per step name.
pub fn static_registry(outputs: &[(&str, &str)]) -> (HandlerRegistry, StaticCalls) {
    let outputs: Rc<BTreeMap<String, String>> = Rc::new(
        outputs
            .iter()
            .map(|(step, text)| (step.to_string(), text.to_string()))
            .collect(),
    );
    let calls = StaticCalls::default();
    let mut registry = HandlerRegistry::empty();
    let factory_calls = calls.clone();
    registry.register(STATIC_HANDLER, move |_| {
        Ok(Box::new(StaticHandler {
            outputs: Rc::clone(&outputs),
            calls: factory_calls.clone(),
        }) as Box<dyn Handler>)
    });
    (registry, calls)
}
