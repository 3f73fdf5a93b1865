//! Service Kit - Agent Tools
//!
//! The four tools the math assistant exposes, each implementing
//! `agent_core::Tool`. Every tool output is reduced to ASCII before it is
//! handed back to the agent loop.

mod wikipedia;
mod calculator;
mod integral;
mod reasoning;

pub use wikipedia::WikipediaTool;
pub use calculator::CalculatorTool;
pub use integral::IntegralSolverTool;
pub use reasoning::ReasoningTool;
