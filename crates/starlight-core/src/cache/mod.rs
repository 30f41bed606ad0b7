//! ============================================================================
//! Cache Module - Per-category item cache over a key-value store
//! ============================================================================
//! Avoids hitting the upstream item store on every category switch.
//!
//! ## Layers
//! ```text
//! CategoryCache::fetch(category)
//!        │  fresh entry?  ──yes──▶ cached items
//!        ▼ no
//! ItemSource::fetch_by_category ──▶ normalize Type ──▶ CacheStore::set
//! ```
//!
//! The store is advisory: swapping in `NoopCacheStore` gives the same
//! results, only slower.
//! ============================================================================

mod category;
mod coalesce;

pub use category::{
    normalize_item_type, CacheConfig, CacheEntry, CacheEntryInfo, CacheStats, CategoryCache,
    CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL_MS, DEFAULT_MAX_CACHE_ENTRIES,
};
pub use coalesce::FetchCoalescer;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::types::CatalogResult;

// ============================================================================
// Key-Value Store
// ============================================================================

/// Durable string key-value storage backing the cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CatalogResult<Option<String>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: &str) -> CatalogResult<()>;

    /// Remove `key`; returns whether it existed
    async fn invalidate(&self, key: &str) -> CatalogResult<bool>;

    async fn keys(&self) -> CatalogResult<Vec<String>>;
}

/// In-process store; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CatalogResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CatalogResult<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CatalogResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> CatalogResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// Store that never retains anything (cache disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    async fn get(&self, _key: &str) -> CatalogResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> CatalogResult<()> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> CatalogResult<bool> {
        Ok(false)
    }

    async fn keys(&self) -> CatalogResult<Vec<String>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.keys().await.unwrap(), vec!["a".to_string()]);

        assert!(store.invalidate("a").await.unwrap());
        assert!(!store.invalidate("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_store_retains_nothing() {
        let store = NoopCacheStore;
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01 in ms
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
