//! # math-solver
//!
//! Text-to-math problem solving on top of `agent-core`.
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────┐
//! │ Wikipedia        │ encyclopedia lookup (MediaWiki API)          │
//! │ Calculator       │ LLM writes the expression, evaluated locally │
//! │ Integral Solver  │ LLM integrates step by step                  │
//! │ Reasoning Tool   │ LLM explains logic/word problems             │
//! └──────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Every tool output is stripped to ASCII before the agent sees it.

pub mod chain;
pub mod error;
pub mod svckit;
pub mod wiki;

use std::sync::Arc;

use agent_core::{
    Agent, AgentBuilder, AgentEvent, ChatSession, GenerationOptions, LlmProvider, Result as CoreResult,
};
use tokio::sync::mpsc::UnboundedSender;

pub use error::{Result, SolverError};
pub use wiki::{MockWikiClient, WikiClient, WikiPage, WikipediaClient, WikipediaConfig};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CalculatorTool, IntegralSolverTool, ReasoningTool, WikipediaTool};
}

/// Assistant settings
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    /// Options for every LLM call (agent and tools)
    pub generation: GenerationOptions,

    /// Agent step limit
    pub max_iterations: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            max_iterations: 15,
        }
    }
}

/// The agent wired with the four math tools
pub struct MathAssistant {
    agent: Agent,
}

impl MathAssistant {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        wiki: Arc<dyn WikiClient>,
        config: AssistantConfig,
    ) -> CoreResult<Self> {
        let generation = config.generation;

        let agent = AgentBuilder::new()
            .provider(Arc::clone(&provider))
            .tool(tools::WikipediaTool::new(wiki))
            .tool(tools::CalculatorTool::new(Arc::clone(&provider), generation.clone()))
            .tool(tools::IntegralSolverTool::new(Arc::clone(&provider), generation.clone()))
            .tool(tools::ReasoningTool::new(provider, generation.clone()))
            .generation(generation)
            .max_iterations(config.max_iterations)
            .handle_parsing_errors(true)
            .build()?;

        Ok(Self { agent })
    }

    /// The underlying agent
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Submit a question on behalf of a chat session
    pub async fn submit(&self, session: &mut ChatSession, question: &str) -> CoreResult<String> {
        session.submit(&self.agent, question).await
    }

    /// Submit while streaming agent steps to `events`
    pub async fn submit_with_events(
        &self,
        session: &mut ChatSession,
        question: &str,
        events: &UnboundedSender<AgentEvent>,
    ) -> CoreResult<String> {
        session.submit_with_events(&self.agent, question, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::Message;
    use agent_core::provider::{Completion, CompletionStream, ModelInfo, ProviderInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Plays the agent and the tool chains from one script
    struct Script(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl LlmProvider for Script {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "Script".into(),
                base_url: String::new(),
                supports_streaming: false,
            }
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            let reply = self.0.lock().unwrap().remove(0);
            Ok(Completion::text(reply, &options.model))
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> CoreResult<CompletionStream> {
            Err(agent_core::AgentError::Provider("unused".into()))
        }

        async fn list_models(&self) -> CoreResult<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_tool_names() {
        let assistant = MathAssistant::new(
            Arc::new(Script(Mutex::new(Vec::new()))),
            Arc::new(MockWikiClient::new()),
            AssistantConfig::default(),
        )
        .unwrap();

        assert_eq!(
            assistant.agent().tools().names(),
            vec!["Wikipedia", "Calculator", "Integral Solver", "Reasoning Tool"]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_calculator() {
        let provider = Arc::new(Script(Mutex::new(vec![
            // agent step 1
            "I need to multiply.\nAction: Calculator\nAction Input: 37593 * 67",
            // calculator chain
            "```text\n37593 * 67\n```\n...evaluate(\"37593 * 67\")...",
            // agent step 2
            "I now know the final answer\nFinal Answer: 2518731",
        ])));
        let assistant = MathAssistant::new(
            provider,
            Arc::new(MockWikiClient::new()),
            AssistantConfig::default(),
        )
        .unwrap();

        let mut session = ChatSession::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let answer = assistant
            .submit_with_events(&mut session, "What is 37593 × 67?", &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(answer, "2518731");
        assert_eq!(session.message_count(), 3);

        let mut observations = Vec::new();
        while let Some(event) = rx.recv().await {
            if let AgentEvent::Observation { output, .. } = event {
                observations.push(output);
            }
        }
        assert_eq!(observations, vec!["Answer: 2518731".to_string()]);
    }
}
