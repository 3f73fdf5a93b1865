//! Reasoning Tool

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    GenerationOptions, LlmProvider, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    clean_text,
};

use crate::chain::PromptChain;

pub const NAME: &str = "Reasoning Tool";

const REASONING_PROMPT: &str = "
You are an AI agent tasked with solving logical and mathematical reasoning questions.
Provide a step-by-step, detailed explanation for the given question:
Question: {question}
Answer:
";

pub struct ReasoningTool {
    chain: PromptChain,
}

impl ReasoningTool {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            chain: PromptChain::new(provider, options, REASONING_PROMPT, "question"),
        }
    }
}

#[async_trait]
impl Tool for ReasoningTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "A tool for answering logic-based and reasoning questions.".into(),
            category: Some("reasoning".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let explanation = self.chain.run(&call.input).await?;
        Ok(ToolResult::success(NAME, clean_text(explanation.trim())))
    }
}
