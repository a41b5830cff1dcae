//! Trait definition for pluggable metasearch backends.
//!
//! The production backend is [`SearxngClient`](crate::searxng::SearxngClient);
//! tests and embedders can supply their own implementation.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::RawResult;

/// A metasearch backend.
///
/// Implementors issue the upstream request and parse the provider-specific
/// response into [`RawResult`] values in the provider's own order. They do
/// **not** deduplicate; that happens in
/// [`orchestrator::dedup`](crate::orchestrator::dedup).
///
/// All implementations must be `Send + Sync` so one backend can serve many
/// concurrent queries.
pub trait MetasearchBackend: Send + Sync {
    /// Perform a search and return parsed results.
    ///
    /// # Arguments
    ///
    /// * `query` - The search query string (the implementation handles encoding).
    /// * `config` - Search configuration controlling timeouts, language, etc.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the HTTP request fails, times out, returns a
    /// non-success status or the response cannot be parsed.
    fn search(
        &self,
        query: &str,
        config: &SearchConfig,
    ) -> impl std::future::Future<Output = Result<Vec<RawResult>, SearchError>> + Send;

    /// Short name of this backend, used in logs.
    fn name(&self) -> &'static str;
}
