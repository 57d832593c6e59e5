//! TTL- and version-keyed result cache.
//!
//! Explicit map-backed store rather than an ambient global: entries evict
//! lazily on `get` past their TTL, and a periodic `sweep` reclaims memory
//! from entries that are never looked up again.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: String,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
}

pub struct ResultCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    default_ttl_ms: u64,
    version: String,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(default_ttl_ms: u64, version: impl Into<String>) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl_ms,
            version: version.into(),
        }
    }

    pub fn set(&self, key: &str, data: T) {
        self.set_with_ttl(key, data, self.default_ttl_ms);
    }

    pub fn set_with_ttl(&self, key: &str, data: T, ttl_ms: u64) {
        let now = Utc::now();
        let entry = CacheEntry {
            data,
            created_at: now,
            expires_at: now + Duration::milliseconds(ttl_ms as i64),
            version: self.version.clone(),
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// Returns the cached value, or `None` while evicting the entry when it
    /// has expired or was written under a different cache version.
    pub fn get(&self, key: &str) -> Option<T> {
        {
            let entry = self.entries.get(key)?;
            if entry.version == self.version && !entry.is_expired() {
                return Some(entry.data.clone());
            }
            // guard dropped before removal to keep the shard lock single-entry
        }
        self.entries.remove(key);
        None
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired or version-mismatched entry. Returns the number
    /// of entries reclaimed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.version == self.version && !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "cache sweep evicted expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache: ResultCache<String> = ResultCache::new(1_000, "v1");
        cache.set("k", "value".to_string());
        assert_eq!(cache.get("k"), Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_expiry_evicts() {
        let cache: ResultCache<u32> = ResultCache::new(10_000, "v1");
        cache.set_with_ttl("k", 7, 30);
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::sleep(StdDuration::from_millis(60)).await;
        assert_eq!(cache.get("k"), None);
        // the expired entry is gone, not just masked
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_missing_key() {
        let cache: ResultCache<u32> = ResultCache::new(1_000, "v1");
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_version_mismatch_is_absent() {
        let cache: ResultCache<u32> = ResultCache::new(10_000, "v1");
        cache.set("k", 1);

        // same store reopened under a new version must ignore old entries
        let upgraded = ResultCache {
            entries: cache.entries,
            default_ttl_ms: 10_000,
            version: "v2".to_string(),
        };
        assert_eq!(upgraded.get("k"), None);
        assert_eq!(upgraded.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_untouched_entries() {
        let cache: ResultCache<u32> = ResultCache::new(10_000, "v1");
        cache.set_with_ttl("short", 1, 20);
        cache.set("long", 2);
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let removed = cache.sweep();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_overwrite_refreshes() {
        let cache: ResultCache<u32> = ResultCache::new(10_000, "v1");
        cache.set("k", 1);
        cache.set("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
