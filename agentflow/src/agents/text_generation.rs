//! Handler that returns generated text without writing files.

use anyhow::Result;
use tracing::{info, instrument};

use super::{Handler, StepEnv};
use crate::io::generator::{GenerateRequest, generate_with_retry};
use crate::io::prompt::{BuiltinPrompt, PromptVars, render_prompt};
use crate::workflow::{AgentConfig, StepDefinition};

pub const HANDLER_NAME: &str = "text_generation";

pub struct TextGenerationAgent {
    config: AgentConfig,
}

impl TextGenerationAgent {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Handler for TextGenerationAgent {
    #[instrument(skip_all, fields(step = %step.name))]
    fn execute(&self, env: &StepEnv<'_>, step: &StepDefinition, input: Option<&str>) -> Result<String> {
        let prompt = render_prompt(
            self.config.prompt.as_deref(),
            BuiltinPrompt::TextGeneration,
            &PromptVars::new(step, input),
        )?;
        let request = GenerateRequest {
            prompt,
            options: self.config.generation.clone(),
        };
        let text = generate_with_retry(env.generator, &env.retry, &request)?;
        info!(len = text.len(), "generated text");
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedGenerator, TestEnv, chain_step};

    #[test]
    fn returns_generated_text() {
        let generator = ScriptedGenerator::new(vec![Ok("  summary  ")]);
        let harness = TestEnv::new();
        let step = chain_step("Analysis", None);
        let agent = TextGenerationAgent::from_config(&step.action.agent_config);
        let text = agent
            .execute(&harness.env(&generator), &step, Some("requirements"))
            .expect("execute");
        assert_eq!(text, "summary");
        assert!(generator.prompts()[0].contains("requirements"));
    }

    #[test]
    fn forwards_generation_options() {
        let generator = ScriptedGenerator::new(vec![Ok("ok")]);
        let harness = TestEnv::new();
        let mut step = chain_step("Analysis", None);
        step.action
            .agent_config
            .generation
            .insert("temperature".to_string(), serde_json::json!(0.2));
        let agent = TextGenerationAgent::from_config(&step.action.agent_config);
        agent
            .execute(&harness.env(&generator), &step, None)
            .expect("execute");
        assert_eq!(
            generator.requests()[0].options.get("temperature"),
            Some(&serde_json::json!(0.2))
        );
    }
}
