//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls which SearXNG instance is queried, how many
//! results are requested, timeouts and the retry budget.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::SafeSearch;

/// Upper bound on retries. Retrieval never retries more than once.
pub const MAX_RETRY_ATTEMPTS: u32 = 1;

/// Configuration for a retrieval operation.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the SearXNG instance (without the `/search` path).
    pub searxng_url: String,
    /// Maximum number of deduplicated results handed downstream.
    pub max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Number of bounded retries for transient failures (0 or 1).
    pub retry_attempts: u32,
    /// Language code forwarded to SearXNG.
    pub language: String,
    /// Safe-search level forwarded to SearXNG.
    pub safe_search: SafeSearch,
    /// Optional SearXNG categories (e.g. `["general", "it"]`).
    pub categories: Vec<String>,
    /// Custom User-Agent. Defaults to `searchflow/<version>`.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            searxng_url: "http://localhost:8888".into(),
            max_results: 10,
            timeout_seconds: 8,
            retry_attempts: 1,
            language: "en".into(),
            safe_search: SafeSearch::Moderate,
            categories: Vec::new(),
            user_agent: None,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `searxng_url` must be an absolute http(s) URL
    /// - `max_results` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    /// - `retry_attempts` must not exceed [`MAX_RETRY_ATTEMPTS`]
    pub fn validate(&self) -> Result<(), SearchError> {
        match url::Url::parse(&self.searxng_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(SearchError::Config(
                    "searxng_url must be an absolute http(s) URL".into(),
                ));
            }
        }
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(SearchError::Config(format!(
                "retry_attempts must be at most {MAX_RETRY_ATTEMPTS}"
            )));
        }
        Ok(())
    }

    /// The `/search` endpoint of the configured instance.
    pub fn search_endpoint(&self) -> String {
        format!("{}/search", self.searxng_url.trim_end_matches('/'))
    }
}
