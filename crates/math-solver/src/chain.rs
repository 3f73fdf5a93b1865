//! Prompt Chains
//!
//! A prompt template with one `{placeholder}`, filled per call and sent to
//! the provider as a single user message.

use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, Message};

use crate::error::Result;

pub struct PromptChain {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    template: &'static str,
    variable: &'static str,
}

impl PromptChain {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: GenerationOptions,
        template: &'static str,
        variable: &'static str,
    ) -> Self {
        Self {
            provider,
            options,
            template,
            variable,
        }
    }

    /// Stop generation at any of these markers
    #[must_use]
    pub fn with_stop(mut self, stops: &[&str]) -> Self {
        self.options = self.options.with_stop(stops.iter().copied());
        self
    }

    /// Fill the template
    pub fn render(&self, value: &str) -> String {
        self.template
            .replace(&format!("{{{}}}", self.variable), value)
    }

    /// Render and complete
    pub async fn run(&self, value: &str) -> Result<String> {
        let prompt = self.render(value);
        let completion = self
            .provider
            .complete(&[Message::user(prompt)], &self.options)
            .await?;
        Ok(completion.content)
    }
}
