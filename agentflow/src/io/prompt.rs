//! Prompt rendering for generation handlers.
//!
//! Steps may carry their own minijinja template in `agent_config.prompt`;
//! otherwise a built-in template for the handler kind is used. Every template
//! sees the same variables: `step`, `description`, `department`, `input` and
//! `guidelines`.

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

use crate::workflow::StepDefinition;

const FILE_GENERATION_TEMPLATE: &str = include_str!("prompts/file_generation.md");
const TEXT_GENERATION_TEMPLATE: &str = include_str!("prompts/text_generation.md");

/// Built-in templates, one per handler kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPrompt {
    FileGeneration,
    TextGeneration,
}

impl BuiltinPrompt {
    fn name(self) -> &'static str {
        match self {
            Self::FileGeneration => "file_generation",
            Self::TextGeneration => "text_generation",
        }
    }
}

/// Variables available to every prompt template.
#[derive(Debug, Clone, Serialize)]
pub struct PromptVars<'a> {
    pub step: &'a str,
    pub description: &'a str,
    pub department: &'a str,
    pub input: Option<&'a str>,
    pub guidelines: &'a [String],
}

impl<'a> PromptVars<'a> {
    pub fn new(step: &'a StepDefinition, input: Option<&'a str>) -> Self {
        Self {
            step: &step.name,
            description: step.description.trim(),
            department: step.responsible_department.trim(),
            input: input.map(str::trim).filter(|s| !s.is_empty()),
            guidelines: &step.action.agent_config.guidelines,
        }
    }
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("file_generation", FILE_GENERATION_TEMPLATE)
            .expect("file generation template should be valid");
        env.add_template("text_generation", TEXT_GENERATION_TEMPLATE)
            .expect("text generation template should be valid");
        Self { env }
    }

    fn render(&self, custom: Option<&str>, builtin: BuiltinPrompt, vars: &PromptVars<'_>) -> Result<String> {
        let rendered = match custom {
            Some(source) => self
                .env
                .render_str(source, vars)
                .with_context(|| format!("render prompt template for step {}", vars.step))?,
            None => self
                .env
                .get_template(builtin.name())?
                .render(vars)
                .with_context(|| format!("render {} prompt", builtin.name()))?,
        };
        Ok(rendered.trim().to_string())
    }
}

/// Render the prompt for one step: the custom template when given, else the built-in one.
pub fn render_prompt(
    custom: Option<&str>,
    builtin: BuiltinPrompt,
    vars: &PromptVars<'_>,
) -> Result<String> {
    let prompt = PromptEngine::new().render(custom, builtin, vars)?;
    debug!(step = vars.step, custom = custom.is_some(), len = prompt.len(), "rendered prompt");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::chain_step;

    #[test]
    fn builtin_file_prompt_describes_the_protocol() {
        let mut step = chain_step("Development", None);
        step.action.agent_config.guidelines = vec!["Use Rust".to_string()];
        let prompt = render_prompt(
            None,
            BuiltinPrompt::FileGeneration,
            &PromptVars::new(&step, Some("Build a CLI")),
        )
        .expect("render");
        assert!(prompt.contains("Build a CLI"));
        assert!(prompt.contains("- Use Rust"));
        assert!(prompt.contains("FILE: relative/path/to/file.ext"));
        assert!(prompt.contains("<<<CONTENT"));
    }

    #[test]
    fn missing_input_omits_the_section() {
        let step = chain_step("Analysis", None);
        let prompt = render_prompt(
            None,
            BuiltinPrompt::TextGeneration,
            &PromptVars::new(&step, Some("   ")),
        )
        .expect("render");
        assert!(!prompt.contains("## Input"));
    }

    #[test]
    fn custom_template_sees_step_variables() {
        let step = chain_step("Review", None);
        let prompt = render_prompt(
            Some("{{ step }}: {{ input | upper }}"),
            BuiltinPrompt::TextGeneration,
            &PromptVars::new(&step, Some("looks good")),
        )
        .expect("render");
        assert_eq!(prompt, "Review: LOOKS GOOD");
    }

    #[test]
    fn broken_template_is_an_error() {
        let step = chain_step("Review", None);
        let err = render_prompt(
            Some("{% if %}"),
            BuiltinPrompt::TextGeneration,
            &PromptVars::new(&step, None),
        )
        .expect_err("syntax error");
        assert!(err.to_string().contains("Review"));
    }
}
