//! Retrieval: one metasearch call, a bounded retry, dedup and truncation.
//!
//! Upstream failures never surface as errors from [`retrieve`]; they are
//! logged and turned into an empty result set so the caller can answer
//! "nothing found" instead of failing the whole request.

use std::time::Duration;

use crate::config::SearchConfig;
use crate::engine::MetasearchBackend;
use crate::error::SearchError;
use crate::types::RawResult;

use super::dedup::deduplicate;

/// Pause before the single retry of a transient failure.
pub const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Query `backend`, retrying once on a transient failure when the config
/// allows it, then deduplicate and truncate to `config.max_results`.
///
/// # Errors
///
/// Returns the last [`SearchError`] if every attempt fails.
pub async fn try_retrieve<B: MetasearchBackend>(
    backend: &B,
    query: &str,
    config: &SearchConfig,
) -> Result<Vec<RawResult>, SearchError> {
    let mut attempt = 0;
    let raw = loop {
        match backend.search(query, config).await {
            Ok(results) => break results,
            Err(err) if err.is_transient() && attempt < config.retry_attempts => {
                attempt += 1;
                tracing::debug!(
                    backend = backend.name(),
                    attempt,
                    error = %err,
                    "transient retrieval failure, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    };

    let mut results = deduplicate(raw);
    results.truncate(config.max_results);
    Ok(results)
}

/// Like [`try_retrieve`], but a failed retrieval yields an empty set.
pub async fn retrieve<B: MetasearchBackend>(
    backend: &B,
    query: &str,
    config: &SearchConfig,
) -> Vec<RawResult> {
    match try_retrieve(backend, query, config).await {
        Ok(results) => {
            tracing::debug!(backend = backend.name(), count = results.len(), "retrieved results");
            results
        }
        Err(err) => {
            tracing::warn!(backend = backend.name(), error = %err, "retrieval failed");
            Vec::new()
        }
    }
}

/// Retrieve several queries concurrently and merge the results.
///
/// Results keep query order, then provider order within a query. The merged
/// set is deduplicated and capped at `limit`. A failing sub-query contributes
/// nothing.
pub async fn retrieve_many<B: MetasearchBackend>(
    backend: &B,
    queries: &[String],
    config: &SearchConfig,
    limit: usize,
) -> Vec<RawResult> {
    let batches =
        futures::future::join_all(queries.iter().map(|q| retrieve(backend, q, config))).await;

    let mut merged = deduplicate(batches.into_iter().flatten().collect());
    merged.truncate(limit);
    merged
}
