//! # agent-runtime
//!
//! Hosted LLM providers for mathgpt.
//!
//! ## Providers
//!
//! - **Groq** (default): OpenAI-compatible chat completions at `api.groq.com`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::groq::GroqProvider;
//!
//! let provider = GroqProvider::new(api_key)?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "groq")]
pub mod groq;

#[cfg(feature = "groq")]
pub use groq::{GroqConfig, GroqProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, ChatSession, LlmProvider, Message, Result, Role, Tool, ToolRegistry,
};
