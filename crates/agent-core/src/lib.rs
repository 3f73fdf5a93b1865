//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction and a text-in,
//! text-out tool system driven by a zero-shot ReAct loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ChatSession                              │
//! │  ┌─────────────────────────────────────────────────────────┐ │
//! │  │                      Agent                              │ │
//! │  │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │ │
//! │  │  │   ReAct     │  │    Tools    │  │   LlmProvider   │  │ │
//! │  │  │   Loop      │──│   Registry  │──│   (Strategy)    │  │ │
//! │  │  └─────────────┘  └─────────────┘  └─────────────────┘  │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Groq or any other hosted
//! backend without changing agent logic.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;
pub mod session;
pub mod text;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentEvent};
pub use session::{ChatSession, MemorySessionStore, SessionId, SessionStore};
pub use text::clean_text;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
