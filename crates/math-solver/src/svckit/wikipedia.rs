//! Wikipedia Tool
//!
//! Looks up background knowledge for topics mentioned in a question.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, clean_text};

use crate::wiki::{WikiClient, WikiPage};

pub const NAME: &str = "Wikipedia";

/// Longest observation handed back to the agent
const MAX_OUTPUT_CHARS: usize = 4000;

const NO_RESULT: &str = "No good Wikipedia Search Result was found";

pub struct WikipediaTool {
    wiki: Arc<dyn WikiClient>,
}

impl WikipediaTool {
    pub fn new(wiki: Arc<dyn WikiClient>) -> Self {
        Self { wiki }
    }
}

fn format_pages(pages: &[WikiPage]) -> String {
    if pages.is_empty() {
        return NO_RESULT.into();
    }

    let joined = pages
        .iter()
        .map(|p| format!("Page: {}\nSummary: {}", p.title, p.summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    joined.chars().take(MAX_OUTPUT_CHARS).collect()
}

#[async_trait]
impl Tool for WikipediaTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "A tool for searching Wikipedia for various information on topics mentioned.".into(),
            category: Some("knowledge".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        match self.wiki.search(&call.input).await {
            Ok(pages) => Ok(ToolResult::success(NAME, clean_text(&format_pages(&pages)))),
            Err(e) => {
                tracing::warn!(client = self.wiki.name(), error = %e, "Wikipedia lookup failed");
                Ok(ToolResult::failure(NAME, clean_text(&format!("Wikipedia lookup failed: {e}"))))
            }
        }
    }
}
