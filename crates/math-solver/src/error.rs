//! Error Types for Math Solver

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Could not evaluate expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("Unknown format from LLM: {0}")]
    UnexpectedFormat(String),

    #[error("LLM error: {0}")]
    Llm(#[from] agent_core::AgentError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SolverError> for agent_core::AgentError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Llm(inner) => inner,
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
