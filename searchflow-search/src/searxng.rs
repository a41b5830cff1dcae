//! SearXNG JSON API client.
//!
//! Issues `GET /search?format=json` against a SearXNG instance and maps its
//! heterogeneous result records onto [`RawResult`].

use serde::Deserialize;

use crate::config::SearchConfig;
use crate::engine::MetasearchBackend;
use crate::error::SearchError;
use crate::http::build_client;
use crate::types::{RawResult, UNKNOWN_ENGINE};

/// Client for a SearXNG instance.
///
/// Cheap to clone: the underlying [`reqwest::Client`] shares its pool.
#[derive(Debug, Clone)]
pub struct SearxngClient {
    client: reqwest::Client,
}

impl SearxngClient {
    /// Build a client whose HTTP settings come from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Wrap an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Query-string parameters for a SearXNG search request.
pub fn query_params(query: &str, config: &SearchConfig) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", query.to_owned()),
        ("format", "json".to_owned()),
        ("language", config.language.clone()),
        ("safesearch", config.safe_search.level().to_string()),
        ("pageno", "1".to_owned()),
    ];
    if !config.categories.is_empty() {
        params.push(("categories", config.categories.join(",")));
    }
    params
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngRecord>,
}

#[derive(Debug, Deserialize)]
struct SearxngRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    engine: Option<String>,
}

/// Parse a SearXNG JSON body into raw results, preserving provider order.
///
/// Missing titles and snippets become empty strings, a missing engine
/// becomes `"unknown"`, and records without a URL are dropped.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the body is not a SearXNG JSON document.
pub fn parse_response(body: &str) -> Result<Vec<RawResult>, SearchError> {
    let response: SearxngResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("invalid SearXNG JSON: {e}")))?;

    let results = response
        .results
        .into_iter()
        .filter_map(|record| {
            let url = record.url.map(|u| u.trim().to_owned())?;
            if url.is_empty() {
                return None;
            }
            Some(RawResult {
                url,
                title: record.title.unwrap_or_default().trim().to_owned(),
                snippet: record.content.unwrap_or_default().trim().to_owned(),
                engine: record
                    .engine
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ENGINE.to_owned()),
            })
        })
        .collect();

    Ok(results)
}

impl MetasearchBackend for SearxngClient {
    async fn search(
        &self,
        query: &str,
        config: &SearchConfig,
    ) -> Result<Vec<RawResult>, SearchError> {
        tracing::trace!(query, "querying SearXNG");

        let response = self
            .client
            .get(config.search_endpoint())
            .query(&query_params(query, config))
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let results = parse_response(&body)?;
        tracing::debug!(count = results.len(), "SearXNG returned results");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "searxng"
    }
}
