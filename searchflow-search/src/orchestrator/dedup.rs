//! Result deduplication by normalised URL.
//!
//! The first occurrence of each page wins and the provider's order is kept,
//! since that order is the only relevance signal the metasearch layer gives.

use std::collections::HashSet;

use crate::types::RawResult;

use super::url_normalize::normalize_url;

/// Drop later occurrences of any URL already seen, preserving first-seen order.
///
/// URLs are compared after [`normalize_url`], so `https://www.a.com/x/` and
/// `https://a.com/x` collapse to a single entry.
pub fn deduplicate(results: Vec<RawResult>) -> Vec<RawResult> {
    let mut seen: HashSet<String> = HashSet::with_capacity(results.len());
    let before = results.len();

    let kept: Vec<RawResult> = results
        .into_iter()
        .filter(|r| seen.insert(normalize_url(&r.url)))
        .collect();

    if kept.len() < before {
        tracing::trace!(dropped = before - kept.len(), "removed duplicate results");
    }
    kept
}
