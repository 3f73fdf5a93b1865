//! Integral Solver Tool
//!
//! Step-by-step integration, delegated to the LLM.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    GenerationOptions, LlmProvider, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    clean_text,
};

use crate::chain::PromptChain;

pub const NAME: &str = "Integral Solver";

const INTEGRAL_PROMPT: &str = "
You are a math expert. Solve the integral of the given function step by step.
Function: {function}
Solution:
";

pub struct IntegralSolverTool {
    chain: PromptChain,
}

impl IntegralSolverTool {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            chain: PromptChain::new(provider, options, INTEGRAL_PROMPT, "function"),
        }
    }
}

#[async_trait]
impl Tool for IntegralSolverTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "A tool for solving integrals. Provide a function to integrate.".into(),
            category: Some("math".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let solution = self.chain.run(&call.input).await?;
        Ok(ToolResult::success(NAME, clean_text(solution.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::EchoProvider;

    #[tokio::test]
    async fn test_integral_prompt_and_cleaning() {
        let provider = Arc::new(EchoProvider::new("\n∫ sin(x) dx = -cos(x) + C\n"));
        let tool = IntegralSolverTool::new(provider.clone(), GenerationOptions::default());

        let result = tool.execute(&ToolCall::new(NAME, "sin(x)")).await.unwrap();
        assert_eq!(result.output, " sin(x) dx = -cos(x) + C");

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Function: sin(x)\nSolution:"));
        assert!(provider.stops.lock().unwrap()[0].is_empty());
    }
}
