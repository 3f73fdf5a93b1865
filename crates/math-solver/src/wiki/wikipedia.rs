//! Wikipedia Client
//!
//! MediaWiki Action API: a full-text search for candidate titles, then the
//! plain-text introduction of each hit.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{WikiClient, WikiPage};
use crate::error::Result;

/// Number of search hits summarized per query
pub const TOP_K_RESULTS: usize = 3;

/// Longest query forwarded to the search API
const MAX_QUERY_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct WikipediaConfig {
    /// Language edition, e.g. "en"
    pub lang: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            lang: "en".into(),
            timeout_secs: 30,
        }
    }
}

impl WikipediaConfig {
    /// Read `WIKIPEDIA_LANG`
    pub fn from_env() -> Self {
        let lang = std::env::var("WIKIPEDIA_LANG")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "en".into());
        Self {
            lang,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: Option<String>,
}

/// Live Wikipedia client
pub struct WikipediaClient {
    client: reqwest::Client,
    endpoint: String,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("mathgpt/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("https://{}.wikipedia.org/w/api.php", config.lang),
        })
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let query: String = query.chars().take(MAX_QUERY_CHARS).collect();
        let limit = TOP_K_RESULTS.to_string();

        let response: SearchResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query.as_str()),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default())
    }

    async fn summary(&self, title: &str) -> Result<Option<String>> {
        let response: ExtractResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .query
            .and_then(|q| q.pages.into_values().find_map(|p| p.extract))
            .filter(|e| !e.trim().is_empty()))
    }
}

#[async_trait]
impl WikiClient for WikipediaClient {
    async fn search(&self, query: &str) -> Result<Vec<WikiPage>> {
        let titles = self.search_titles(query).await?;
        let mut pages = Vec::with_capacity(titles.len());

        for title in titles {
            match self.summary(&title).await {
                Ok(Some(summary)) => pages.push(WikiPage { title, summary }),
                Ok(None) => tracing::debug!(%title, "Page has no introduction"),
                // Disambiguation pages and races with deletions are skipped.
                Err(e) => tracing::warn!(%title, error = %e, "Could not fetch page summary"),
            }
        }

        if pages.is_empty() {
            tracing::debug!(%query, "No Wikipedia results");
        }
        Ok(pages)
    }

    fn name(&self) -> &str {
        "Wikipedia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for_language() {
        let client = WikipediaClient::new(&WikipediaConfig {
            lang: "de".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint, "https://de.wikipedia.org/w/api.php");
    }

    #[test]
    fn test_search_response_parsing() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[{"ns":0,"title":"Integral"},{"ns":0,"title":"Antiderivative"}]}}"#,
        )
        .unwrap();
        let titles: Vec<String> = parsed.query.unwrap().search.into_iter().map(|h| h.title).collect();
        assert_eq!(titles, vec!["Integral", "Antiderivative"]);
    }

    #[test]
    fn test_extract_response_parsing() {
        let parsed: ExtractResponse = serde_json::from_str(
            r#"{"query":{"pages":{"15258":{"pageid":15258,"ns":0,"title":"Integral","extract":"In mathematics, an integral..."}}}}"#,
        )
        .unwrap();
        let extract = parsed.query.unwrap().pages.into_values().find_map(|p| p.extract);
        assert_eq!(extract.as_deref(), Some("In mathematics, an integral..."));
    }

    #[test]
    fn test_missing_page_parsing() {
        let parsed: ExtractResponse =
            serde_json::from_str(r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nope","missing":""}}}}"#)
                .unwrap();
        assert!(parsed.query.unwrap().pages.into_values().find_map(|p| p.extract).is_none());
    }
}
