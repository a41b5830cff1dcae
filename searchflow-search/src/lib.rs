//! # searchflow-search
//!
//! Metasearch retrieval for searchflow.
//!
//! Queries a SearXNG instance over its JSON API and returns an ordered,
//! duplicate-free list of raw hits for the ranking stages to work on.
//!
//! ## Design
//!
//! - One upstream request per query, with at most one retry on transient
//!   failures (timeouts, connection errors, 5xx)
//! - Deduplication by normalised URL, first occurrence wins, provider order kept
//! - Graceful degradation: a failed retrieval yields an empty set, never an error
//! - The backend is a trait, so tests and embedders can swap SearXNG out
//!
//! ## Security
//!
//! - No network listeners; this is a library, not a server
//! - Search queries are logged only at trace level
//! - Queries are never embedded in error messages

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod searxng;
pub mod types;

pub use config::SearchConfig;
pub use engine::MetasearchBackend;
pub use error::{Result, SearchError};
pub use searxng::SearxngClient;
pub use types::{RawResult, SafeSearch};

/// Retrieve results for `query` from the SearXNG instance in `config`.
///
/// Returns at most `config.max_results` deduplicated hits in provider order.
/// Upstream failures are logged and produce an empty vector.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` is invalid, or
/// [`SearchError::Http`] if the HTTP client cannot be built.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> searchflow_search::Result<()> {
/// let config = searchflow_search::SearchConfig::default();
/// let results = searchflow_search::search("rust ownership", &config).await?;
/// for result in &results {
///     println!("{}: {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(query: &str, config: &SearchConfig) -> Result<Vec<RawResult>> {
    config.validate()?;
    let client = SearxngClient::new(config)?;
    Ok(orchestrator::retrieve::retrieve(&client, query, config).await)
}

/// Like [`search`], but surfaces the upstream failure instead of an empty set.
///
/// # Errors
///
/// Returns the configuration error, or the last upstream error once the
/// retry budget is spent.
pub async fn try_search(query: &str, config: &SearchConfig) -> Result<Vec<RawResult>> {
    config.validate()?;
    let client = SearxngClient::new(config)?;
    orchestrator::retrieve::try_retrieve(&client, query, config).await
}
