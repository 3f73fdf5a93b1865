//! Mock Wiki Client
//!
//! Canned pages for tests and offline demos.

use async_trait::async_trait;

use super::{WikiClient, WikiPage};
use crate::error::Result;

/// Returns pages whose title contains a word of the query
#[derive(Default)]
pub struct MockWikiClient {
    pages: Vec<WikiPage>,
}

impl MockWikiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client preloaded with a few math articles
    pub fn with_math_pages() -> Self {
        Self::new()
            .with_page(
                "Integral",
                "In mathematics, an integral is the continuous analog of a sum, which is used to calculate areas, volumes, and their generalizations.",
            )
            .with_page(
                "Pythagorean theorem",
                "In mathematics, the Pythagorean theorem or Pythagoras' theorem is a fundamental relation in Euclidean geometry between the three sides of a right triangle.",
            )
            .with_page(
                "Pi",
                "The number π (spelled out as pi) is a mathematical constant, approximately equal to 3.14159, that is the ratio of a circle's circumference to its diameter.",
            )
    }

    #[must_use]
    pub fn with_page(mut self, title: &str, summary: &str) -> Self {
        self.pages.push(WikiPage {
            title: title.into(),
            summary: summary.into(),
        });
        self
    }
}

#[async_trait]
impl WikiClient for MockWikiClient {
    async fn search(&self, query: &str) -> Result<Vec<WikiPage>> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|w| w.len() > 1)
            .collect();

        Ok(self
            .pages
            .iter()
            .filter(|p| {
                let title = p.title.to_lowercase();
                words.iter().any(|w| title.contains(w.as_str()))
            })
            .take(super::wikipedia::TOP_K_RESULTS)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "MockWiki"
    }
}
