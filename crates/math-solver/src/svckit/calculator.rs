//! Calculator Tool
//!
//! The LLM translates the problem into a single-line expression; the
//! expression itself is evaluated locally, never by the model.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    GenerationOptions, LlmProvider, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    clean_text,
};

use crate::chain::PromptChain;
use crate::error::{Result, SolverError};

pub const NAME: &str = "Calculator";

const TEXT_FENCE: &str = "```text";
const FENCE: &str = "```";
const ANSWER: &str = "Answer:";

const MATH_PROMPT: &str = r#"Translate a math problem into a expression that can be evaluated by a calculator. Use the output of evaluating this expression to answer the question.
Supported: + - * / % ^, parentheses, sqrt, abs, exp, ln, sin, cos, tan, asin, acos, atan, atan2, sinh, cosh, tanh, floor, ceil, round, signum, max, min, and the constants pi and e.

Question: ${Question with math problem.}
```text
${single line mathematical expression that solves the problem}
```
...evaluate(expression)...
```output
${Output of evaluating the expression}
```
Answer: ${Answer}

Begin.

Question: What is 37593 * 67?
```text
37593 * 67
```
...evaluate("37593 * 67")...
```output
2518731
```
Answer: 2518731

Question: 37593^(1/5)
```text
37593^(1/5)
```
...evaluate("37593^(1/5)")...
```output
8.222831614237718
```
Answer: 8.222831614237718

Question: {question}
"#;

pub struct CalculatorTool {
    chain: PromptChain,
}

impl CalculatorTool {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            chain: PromptChain::new(provider, options, MATH_PROMPT, "question")
                .with_stop(&["```output"]),
        }
    }

    async fn solve(&self, question: &str) -> Result<String> {
        let reply = self.chain.run(question).await?;
        process_reply(&reply)
    }
}

/// Turn the model's reply into an `Answer: ...` line
fn process_reply(reply: &str) -> Result<String> {
    let reply = reply.trim();

    if let Some(start) = reply.find(TEXT_FENCE) {
        let body = &reply[start + TEXT_FENCE.len()..];
        let expression = body.find(FENCE).map_or(body, |end| &body[..end]);
        let value = evaluate(expression)?;
        return Ok(format!("{ANSWER} {value}"));
    }

    if reply.starts_with(ANSWER) {
        return Ok(reply.to_string());
    }

    if let Some(idx) = reply.rfind(ANSWER) {
        return Ok(format!("{ANSWER} {}", reply[idx + ANSWER.len()..].trim()));
    }

    Err(SolverError::UnexpectedFormat(reply.to_string()))
}

/// Evaluate a single-line expression; `**` is accepted for powers
fn evaluate(expression: &str) -> Result<String> {
    let expression = expression.trim().replace("**", "^");
    if expression.is_empty() {
        return Err(SolverError::Expression {
            expression,
            reason: "empty expression".into(),
        });
    }

    let value = meval::eval_str(&expression).map_err(|e| SolverError::Expression {
        expression: expression.clone(),
        reason: e.to_string(),
    })?;

    if !value.is_finite() {
        return Err(SolverError::Expression {
            expression,
            reason: "result is not a finite number".into(),
        });
    }

    Ok(value.to_string())
}

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "A tool for solving math-related questions. Only input mathematical expressions.".into(),
            category: Some("math".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        match self.solve(&call.input).await {
            Ok(answer) => Ok(ToolResult::success(NAME, clean_text(&answer))),
            Err(SolverError::Llm(e)) => Err(e),
            Err(e) => Ok(ToolResult::failure(NAME, clean_text(&e.to_string()))),
        }
    }
}
