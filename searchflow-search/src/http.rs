//! Shared HTTP client for metasearch requests.
//!
//! Provides a configured [`reqwest::Client`] with a bounded timeout and an
//! identifying User-Agent. The client keeps a connection pool and is cheap
//! to clone, so one instance is shared by all concurrent queries.

use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::SearchError;

/// Default User-Agent sent to the metasearch provider.
pub fn default_user_agent() -> String {
    format!("searchflow/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a [`reqwest::Client`] configured for SearXNG requests.
///
/// The client has:
/// - Timeout from config (a request exceeding it fails, it never hangs)
/// - Custom User-Agent if configured, otherwise `searchflow/<version>`
/// - Brotli and gzip decompression
/// - A short redirect limit
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(default_user_agent);

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.timeout_seconds.min(5)))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}
