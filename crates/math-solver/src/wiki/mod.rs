//! Encyclopedia Integration
//!
//! Abstractions and implementations for encyclopedia lookups.

mod mock;
mod wikipedia;

pub use mock::MockWikiClient;
pub use wikipedia::{WikipediaClient, WikipediaConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One search hit with its introductory summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub title: String,
    pub summary: String,
}

/// Encyclopedia client trait (Strategy pattern)
#[async_trait]
pub trait WikiClient: Send + Sync {
    /// Best matching pages for a query, most relevant first
    async fn search(&self, query: &str) -> Result<Vec<WikiPage>>;

    /// Client name
    fn name(&self) -> &str;
}
