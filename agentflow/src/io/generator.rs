//! Generator abstraction for text generation backends.
//!
//! The [`Generator`] trait decouples handlers from the backend that turns a
//! prompt into text. [`CommandGenerator`] shells out to a configured command;
//! tests use scripted generators that return predetermined responses.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::PipelineError;
use crate::io::config::GeneratorConfig;
use crate::io::process::{ProcessRequest, run_process};
use crate::io::retry::RetryController;

/// Environment variable carrying the JSON-encoded generation options.
pub const OPTIONS_ENV: &str = "AGENTFLOW_GENERATION_OPTIONS";

/// One generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Backend-specific options (model, temperature, ...), passed through untouched.
    pub options: BTreeMap<String, Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: BTreeMap::new(),
        }
    }
}

/// Turns a prompt into text. Implementations may fail transiently.
pub trait Generator {
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Generator that pipes the prompt into an external command and reads stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_secs),
            config.output_limit_bytes,
        )
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(prompt_len = request.prompt.len(), timeout_secs = self.timeout.as_secs()))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut process = ProcessRequest::from_command(&self.command, request.prompt.as_bytes())?;
        process.timeout = self.timeout;
        process.output_limit_bytes = self.output_limit_bytes;
        if !request.options.is_empty() {
            let options =
                serde_json::to_string(&request.options).context("serialize generation options")?;
            process.env.push((OPTIONS_ENV.to_string(), options.into()));
        }

        let output = run_process(&process).context("run generator")?;
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "generator timed out");
            return Err(anyhow!("generator timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "generator exited with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(500)
            ));
        }

        let text = output.stdout_text();
        debug!(response_len = text.len(), "generator completed");
        Ok(text)
    }
}

/// Generate with the retry controller; blank responses are retried.
pub fn generate_with_retry(
    generator: &dyn Generator,
    retry: &RetryController<'_>,
    request: &GenerateRequest,
) -> Result<String, PipelineError> {
    retry.with_retry("generation", |attempt| {
        debug!(attempt, "requesting generation");
        generator.generate(request)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::retry::RetryPolicy;
    use crate::test_support::{RecordingSleeper, ScriptedGenerator};

    #[test]
    fn retries_until_non_blank_response() {
        let generator = ScriptedGenerator::new(vec![Err("timeout"), Ok(""), Ok("X")]);
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(RetryPolicy::default(), &sleeper);
        let text = generate_with_retry(&generator, &retry, &GenerateRequest::new("p"))
            .expect("generated");
        assert_eq!(text, "X");
        assert_eq!(generator.prompts(), vec!["p", "p", "p"]);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_reads_stdout() {
        let generator = CommandGenerator::new(
            vec!["sh".to_string(), "-c".to_string(), "tr a-z A-Z".to_string()],
            Duration::from_secs(10),
            1024,
        );
        let text = generator
            .generate(&GenerateRequest::new("hello"))
            .expect("generate");
        assert_eq!(text, "HELLO");
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_forwards_options() {
        let generator = CommandGenerator::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("printf '%s' \"${OPTIONS_ENV}\""),
            ],
            Duration::from_secs(10),
            1024,
        );
        let mut request = GenerateRequest::new("ignored");
        request
            .options
            .insert("model".to_string(), Value::String("m1".to_string()));
        let text = generator.generate(&request).expect("generate");
        assert_eq!(text, r#"{"model":"m1"}"#);
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_surfaces_failures() {
        let generator = CommandGenerator::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo 'quota exceeded' >&2; exit 1".to_string(),
            ],
            Duration::from_secs(10),
            1024,
        );
        let err = generator
            .generate(&GenerateRequest::new("p"))
            .expect_err("failure");
        assert!(err.to_string().contains("quota exceeded"));
    }
}
