//! Resolution cache
//!
//! Process-wide memoization of keyword resolutions, keyed on the normalized
//! keyword text. Created once at startup and handed to the resolver by
//! handle; cloning shares the same underlying store.
//!
//! Writes are first-writer-wins per key: when two resolutions of the same
//! keyword race, the first insertion is kept and later ones are dropped.
//!
//! Author: hephaex@gmail.com

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wdlink_core::{normalize_keyword, Resolution, ResolverConfig};

// ============================================================================
// Resolution Cache
// ============================================================================

/// Concurrent keyword -> resolution store
#[derive(Clone)]
pub struct ResolutionCache {
    cache: Cache<String, Resolution>,
    stats: Arc<CacheStats>,
}

impl ResolutionCache {
    /// Unbounded cache for the lifetime of the process
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Cache with an optional entry bound (LRU-style eviction when set)
    pub fn with_capacity(max_capacity: Option<u64>) -> Self {
        let mut builder = Cache::<String, Resolution>::builder();
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::with_capacity(config.cache_max_capacity)
    }

    /// Look up a keyword; the key is normalized before lookup.
    pub async fn get(&self, keyword: &str) -> Option<Resolution> {
        let result = self.cache.get(&normalize_keyword(keyword)).await;

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        result
    }

    /// Store a resolution unless one is already present for the key.
    ///
    /// Returns the resolution held by the cache after the call, which is
    /// the earlier entry when this write lost the race.
    pub async fn put(&self, keyword: &str, resolution: Resolution) -> Resolution {
        let entry = self
            .cache
            .entry(normalize_keyword(keyword))
            .or_insert(resolution)
            .await;

        if entry.is_fresh() {
            self.stats.record_write();
        } else {
            self.stats.record_superseded();
        }

        entry.into_value()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.cache.contains_key(&normalize_keyword(keyword))
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    superseded: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self) -> CacheStatsReport {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStatsReport {
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

/// Serializable cache statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    /// Insertions that stored a new entry
    pub writes: u64,
    /// Insertions dropped because the key was already present
    pub superseded: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdlink_core::{Candidate, Qid};

    fn resolved(keyword: &str, qid: &str) -> Resolution {
        let candidate = Candidate::new(Qid::parse(qid).unwrap(), keyword, 1.0);
        Resolution::resolved(keyword, &candidate, 0.9)
    }

    #[tokio::test]
    async fn test_get_and_put() {
        let cache = ResolutionCache::new();
        assert!(cache.get("paris").await.is_none());

        cache.put("paris", resolved("paris", "Q90")).await;
        let hit = cache.get("paris").await.unwrap();
        assert_eq!(hit.qid.unwrap().as_str(), "Q90");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_key_is_normalized() {
        let cache = ResolutionCache::new();
        cache.put("  Paris ", resolved("paris", "Q90")).await;

        assert!(cache.get("PARIS").await.is_some());
        assert!(cache.contains("paris"));
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let cache = ResolutionCache::new();
        let first = cache.put("python", resolved("python", "Q812939")).await;
        let second = cache.put("Python", resolved("python", "Q28865")).await;

        assert_eq!(first, second);
        assert_eq!(cache.get("python").await.unwrap().qid.unwrap().as_str(), "Q812939");
        assert_eq!(cache.stats().superseded, 1);
    }

    #[tokio::test]
    async fn test_unresolved_is_cached() {
        let cache = ResolutionCache::new();
        cache.put("xyzzy", Resolution::unresolved("xyzzy")).await;

        let hit = cache.get("xyzzy").await.unwrap();
        assert!(!hit.is_resolved());
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_one_entry() {
        let cache = ResolutionCache::new();
        let handles: Vec<_> = (1..=16)
            .map(|n| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .put("berlin", resolved("berlin", &format!("Q{n}")))
                        .await
                })
            })
            .collect();

        let mut stored = Vec::new();
        for handle in handles {
            stored.push(handle.await.unwrap());
        }

        // every writer observes the same winning entry
        assert!(stored.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.get("berlin").await, Some(stored[0].clone()));
        assert_eq!(cache.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResolutionCache::new();
        cache.put("rome", resolved("rome", "Q220")).await;
        cache.clear().await;
        assert!(cache.get("rome").await.is_none());
    }
}
