//! Handler that generates files and materializes them under the step's base dir.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::{Handler, StepEnv, log_category};
use crate::batch::process_with_regeneration;
use crate::error::PipelineError;
use crate::io::generator::{GenerateRequest, generate_with_retry};
use crate::io::materialize::Materializer;
use crate::io::prompt::{BuiltinPrompt, PromptVars, render_prompt};
use crate::io::version_log::VersionedLog;
use crate::workflow::{AgentConfig, StepDefinition};

pub const HANDLER_NAME: &str = "file_generation";

/// Prompts the generator, extracts file blocks from the response and writes
/// them under `<root>/<base_dir>`. A response without usable files is
/// regenerated with `retry_prompt` (or the original prompt).
///
/// Returns the response the files were taken from.
pub struct FileGenerationAgent {
    config: AgentConfig,
    base_dir: String,
}

impl FileGenerationAgent {
    pub fn from_config(config: &AgentConfig) -> Result<Self, PipelineError> {
        let base_dir = config
            .base_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| {
                PipelineError::configuration("file_generation requires agent_config.base_dir")
            })?;
        Ok(Self {
            config: config.clone(),
            base_dir: base_dir.to_string(),
        })
    }
}

impl Handler for FileGenerationAgent {
    #[instrument(skip_all, fields(step = %step.name, base_dir = %self.base_dir))]
    fn execute(&self, env: &StepEnv<'_>, step: &StepDefinition, input: Option<&str>) -> Result<String> {
        let vars = PromptVars::new(step, input);
        let prompt = render_prompt(
            self.config.prompt.as_deref(),
            BuiltinPrompt::FileGeneration,
            &vars,
        )?;
        let retry_prompt = match self.config.retry_prompt.as_deref() {
            Some(template) => render_prompt(Some(template), BuiltinPrompt::FileGeneration, &vars)?,
            None => prompt.clone(),
        };

        let request = GenerateRequest {
            prompt,
            options: self.config.generation.clone(),
        };
        let retry_request = GenerateRequest {
            prompt: retry_prompt,
            options: self.config.generation.clone(),
        };

        let materializer = Materializer::new(
            env.root.join(&self.base_dir),
            VersionedLog::new(env.logs_dir, &log_category(step)),
        );
        let response = generate_with_retry(env.generator, &env.retry, &request)?;
        let outcome = process_with_regeneration(
            response,
            env.extractor,
            &materializer,
            &env.retry,
            Some(|| generate_with_retry(env.generator, &env.retry, &retry_request)),
        )?;

        for skipped in &outcome.skipped {
            warn!(path = %skipped.path, reason = %skipped.reason, "record skipped");
        }
        info!(
            files = outcome.written.len(),
            skipped = outcome.skipped.len(),
            attempts = outcome.attempts,
            "step produced files"
        );
        Ok(outcome.response)
    }
}
