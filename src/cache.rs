//! Result cache.
//!
//! The pipeline talks to a [`ResultCache`]; whether answers are actually
//! stored is up to the implementation. [`MemoryCache`] keeps them in a
//! [`moka`] cache with a TTL per entry; [`NoopCache`] stores nothing, which
//! makes every query run the full pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::response::PipelineResult;

/// Prefix of every cache fingerprint.
pub const FINGERPRINT_PREFIX: &str = "searchflow:query:";

/// Hex characters of the SHA-256 digest kept in a fingerprint.
const FINGERPRINT_HEX_LEN: usize = 16;

/// Deterministic cache key for `query`.
///
/// Case and surrounding whitespace do not matter:
/// `"  Rust Async "` and `"rust async"` share a fingerprint.
pub fn fingerprint(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{FINGERPRINT_PREFIX}{}", &digest[..FINGERPRINT_HEX_LEN])
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries currently stored (approximate for concurrent caches).
    pub entries: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Storage for finished pipeline results, keyed by [`fingerprint`].
///
/// Implementations must be safe for concurrent use and must not fail the
/// request: an unavailable store behaves like a miss.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up a stored result.
    async fn get(&self, fingerprint: &str) -> Option<PipelineResult>;

    /// Store `result` for `ttl`.
    async fn set(&self, fingerprint: String, result: PipelineResult, ttl: Duration);

    /// Current counters.
    async fn stats(&self) -> CacheStats;

    /// Drop every entry.
    async fn clear(&self);
}

#[derive(Clone)]
struct Entry {
    result: PipelineResult,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache with a TTL per entry and a capacity bound.
pub struct MemoryCache {
    inner: Cache<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` results.
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, fingerprint: &str) -> Option<PipelineResult> {
        match self.inner.get(fingerprint).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(fingerprint, "cache hit");
                Some(entry.result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(fingerprint, "cache miss");
                None
            }
        }
    }

    async fn set(&self, fingerprint: String, result: PipelineResult, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.inner.insert(fingerprint, Entry { result, ttl }).await;
    }

    async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
        }
    }

    async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }
}

/// A cache that stores nothing; every lookup misses.
#[derive(Debug, Default)]
pub struct NoopCache {
    misses: AtomicU64,
}

#[async_trait]
impl ResultCache for NoopCache {
    async fn get(&self, _fingerprint: &str) -> Option<PipelineResult> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set(&self, _fingerprint: String, _result: PipelineResult, _ttl: Duration) {}

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: 0,
            misses: self.misses.load(Ordering::Relaxed),
            entries: 0,
        }
    }

    async fn clear(&self) {}
}
