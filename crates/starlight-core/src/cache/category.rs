//! ============================================================================
//! Category Cache - TTL-checked item lists per category
//! ============================================================================
//! Entries are checked lazily on access; there is no background sweep.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::coalesce::FetchCoalescer;
use super::{CacheStore, Clock, SystemClock};
use crate::source::{is_all_category, ItemSource};
use crate::types::{CatalogResult, Item, ALL_CATEGORY, MISCELLANEOUS_TYPE, MISC_TYPE, TYPE_FIELD};

/// Default freshness window (24 hours)
pub const DEFAULT_CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Default number of categories kept in the store
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 64;

/// Prefix separating cache entries from anything else in the store
pub const CACHE_KEY_PREFIX: &str = "items:";

/// Cache tunables. `ttl_ms` and `max_entries` are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries younger than this are served without an upstream call
    pub ttl_ms: i64,
    /// Maximum categories kept; the oldest entry is evicted first. 0 = unbounded
    pub max_entries: usize,
    /// Serve an expired entry when the upstream refresh fails
    pub serve_stale_on_error: bool,
    /// Let only one fetch per category reach upstream at a time
    pub coalesce_fetches: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
            serve_stale_on_error: false,
            coalesce_fetches: false,
        }
    }
}

/// Serialized value stored per category. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Milliseconds since the Unix epoch
    pub fetched_at: i64,
    pub items: Vec<Item>,
}

impl CacheEntry {
    /// Age at `now_ms`, saturating for out-of-range timestamps
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.fetched_at)
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.age_ms(now_ms) < ttl_ms
    }
}

/// Summary of one stored entry
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub category: String,
    pub fetched_at: i64,
    pub item_count: usize,
    pub fresh: bool,
}

/// Store-wide cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    /// Entries that failed to parse
    pub corrupted: usize,
    pub entries: Vec<CacheEntryInfo>,
}

/// Map the backend `Misc` sentinel (or a missing type) to `Miscellaneous`
pub fn normalize_item_type(mut item: Item) -> Item {
    let needs_default = match item.item_type() {
        None => true,
        Some(t) => t == MISC_TYPE,
    };
    if needs_default {
        item.set_field(TYPE_FIELD, MISCELLANEOUS_TYPE);
    }
    item
}

/// Category as the upstream knows it: empty means `All`, and the
/// normalized `Miscellaneous` label maps back to the `Misc` sentinel
fn upstream_category(category: &str) -> &str {
    if is_all_category(category) {
        ALL_CATEGORY
    } else if category == MISCELLANEOUS_TYPE {
        MISC_TYPE
    } else {
        category
    }
}

fn cache_key(category: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, category)
}

/// Category cache in front of an upstream item source
pub struct CategoryCache {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn ItemSource>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    coalescer: Option<FetchCoalescer>,
}

impl CategoryCache {
    /// Create a cache with the default config and the system clock
    pub fn new(store: Arc<dyn CacheStore>, source: Arc<dyn ItemSource>) -> Self {
        Self::with_config(store, source, CacheConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn ItemSource>,
        config: CacheConfig,
    ) -> Self {
        Self::with_clock(store, source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn ItemSource>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let coalescer = config.coalesce_fetches.then(FetchCoalescer::new);
        Self {
            store,
            source,
            clock,
            config,
            coalescer,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Items for `category`, from cache when fresh, otherwise from upstream.
    ///
    /// The result is wholly cached or wholly fresh. Upstream failures are
    /// returned as errors unless `serve_stale_on_error` is set and an expired
    /// entry exists.
    pub async fn fetch(&self, category: &str) -> CatalogResult<Vec<Item>> {
        let category = upstream_category(category);
        let key = cache_key(category);

        let _guard = match &self.coalescer {
            Some(coalescer) => Some(coalescer.acquire(&key).await),
            None => None,
        };

        let now = self.clock.now_ms();
        let cached = self.read_entry(&key).await;

        if let Some(entry) = &cached {
            if entry.is_fresh(now, self.config.ttl_ms) {
                debug!(
                    "Cache hit for category {}: {} items (age: {}ms)",
                    category,
                    entry.items.len(),
                    entry.age_ms(now)
                );
                return Ok(entry.items.clone());
            }
        }

        // Cache miss or expired - fetch fresh
        debug!("Cache miss for category {}, fetching from upstream", category);
        let items = match self.source.fetch_by_category(category).await {
            Ok(items) => items,
            Err(e) => {
                if self.config.serve_stale_on_error {
                    if let Some(entry) = cached {
                        warn!(
                            "Upstream fetch for {} failed: {} - serving stale entry from {}",
                            category, e, entry.fetched_at
                        );
                        return Ok(entry.items);
                    }
                }
                return Err(e);
            }
        };

        let items: Vec<Item> = items.into_iter().map(normalize_item_type).collect();
        let entry = CacheEntry {
            fetched_at: self.clock.now_ms(),
            items,
        };
        self.write_entry(&key, &entry).await;

        info!("Refreshed category {} ({} items)", category, entry.items.len());
        Ok(entry.items)
    }

    /// Drop the entry for one category
    pub async fn invalidate(&self, category: &str) -> CatalogResult<bool> {
        let category = upstream_category(category);
        let removed = self.store.invalidate(&cache_key(category)).await?;
        if removed {
            info!("Invalidated cache for category {}", category);
        }
        Ok(removed)
    }

    /// Drop every cached category; returns how many were removed
    pub async fn clear(&self) -> CatalogResult<usize> {
        let mut count = 0;
        for key in self.cache_keys().await? {
            if self.store.invalidate(&key).await? {
                count += 1;
            }
        }
        info!("Cleared {} cached categories", count);
        Ok(count)
    }

    pub async fn stats(&self) -> CatalogResult<CacheStats> {
        let now = self.clock.now_ms();
        let mut entries = Vec::new();
        let mut corrupted = 0;

        for key in self.cache_keys().await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entries.push(CacheEntryInfo {
                    category: key[CACHE_KEY_PREFIX.len()..].to_string(),
                    fetched_at: entry.fetched_at,
                    item_count: entry.items.len(),
                    fresh: entry.is_fresh(now, self.config.ttl_ms),
                }),
                Err(_) => corrupted += 1,
            }
        }
        entries.sort_by(|a, b| a.category.cmp(&b.category));

        Ok(CacheStats {
            total: entries.len() + corrupted,
            fresh: entries.iter().filter(|e| e.fresh).count(),
            corrupted,
            entries,
        })
    }

    async fn cache_keys(&self) -> CatalogResult<Vec<String>> {
        let mut keys = self.store.keys().await?;
        keys.retain(|k| k.starts_with(CACHE_KEY_PREFIX));
        Ok(keys)
    }

    /// Read and parse an entry. Unreadable or corrupted entries count as a miss.
    async fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read cache entry {}: {} - treating as miss", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding corrupted cache entry {}: {}", key, e);
                if let Err(e) = self.store.invalidate(key).await {
                    warn!("Failed to discard cache entry {}: {}", key, e);
                }
                None
            }
        }
    }

    /// Write failures are logged only; the cache is advisory
    async fn write_entry(&self, key: &str, entry: &CacheEntry) {
        if let Err(e) = self.evict_for(key).await {
            warn!("Cache eviction failed: {}", e);
        }

        let value = match serde_json::to_string(entry) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, &value).await {
            warn!("Failed to write cache entry {}: {}", key, e);
        }
    }

    /// Evict oldest entries so that writing `key` stays within `max_entries`
    async fn evict_for(&self, key: &str) -> CatalogResult<()> {
        if self.config.max_entries == 0 {
            return Ok(());
        }

        let others: Vec<String> = self
            .cache_keys()
            .await?
            .into_iter()
            .filter(|k| k != key)
            .collect();

        let excess = (others.len() + 1).saturating_sub(self.config.max_entries);
        if excess == 0 {
            return Ok(());
        }

        // Unparseable entries go first
        let mut aged = Vec::with_capacity(others.len());
        for other in others {
            let fetched_at = match self.store.get(&other).await? {
                Some(raw) => serde_json::from_str::<CacheEntry>(&raw)
                    .map(|e| e.fetched_at)
                    .unwrap_or(i64::MIN),
                None => i64::MIN,
            };
            aged.push((fetched_at, other));
        }
        aged.sort();

        for (_, oldest) in aged.into_iter().take(excess) {
            self.store.invalidate(&oldest).await?;
            debug!("Evicted cache entry {}", oldest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryCacheStore, NoopCacheStore};
    use crate::types::{CatalogError, NAME_FIELD};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    /// Upstream stub that counts calls and can be told to fail
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        last_category: std::sync::Mutex<Option<String>>,
        delay_ms: u64,
    }

    impl CountingSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ItemSource for CountingSource {
        async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<Item>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_category.lock().unwrap() = Some(category.to_string());
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::Upstream {
                    category: category.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(vec![
                Item::new("1").with_field(NAME_FIELD, "Stim Pack").with_field(TYPE_FIELD, "Misc"),
                Item::new("2").with_field(NAME_FIELD, "Rope"),
                Item::new("3").with_field(NAME_FIELD, "Visor").with_field(TYPE_FIELD, "Armor"),
            ])
        }
    }

    struct Harness {
        cache: CategoryCache,
        store: Arc<MemoryCacheStore>,
        source: Arc<CountingSource>,
        clock: Arc<ManualClock>,
    }

    fn harness(config: CacheConfig, source: CountingSource) -> Harness {
        let store = Arc::new(MemoryCacheStore::new());
        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::new(T0));
        let cache = CategoryCache::with_clock(store.clone(), source.clone(), config, clock.clone());
        Harness {
            cache,
            store,
            source,
            clock,
        }
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let h = harness(CacheConfig::default(), CountingSource::default());

        h.cache.fetch("Armor").await.unwrap();
        assert_eq!(h.source.calls(), 1);

        h.clock.set(T0 + DEFAULT_CACHE_TTL_MS - 1);
        h.cache.fetch("Armor").await.unwrap();
        assert_eq!(h.source.calls(), 1, "Entry should still be fresh one ms before TTL");

        h.clock.set(T0 + DEFAULT_CACHE_TTL_MS);
        h.cache.fetch("Armor").await.unwrap();
        assert_eq!(h.source.calls(), 2, "Entry should be stale at exactly TTL");
    }

    #[tokio::test]
    async fn test_type_normalization() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        let items = h.cache.fetch("All").await.unwrap();

        assert_eq!(items[0].item_type(), Some(MISCELLANEOUS_TYPE));
        assert_eq!(items[1].item_type(), Some(MISCELLANEOUS_TYPE));
        assert_eq!(items[2].item_type(), Some("Armor"));

        // Cached copy is normalized too
        let cached = h.cache.fetch("All").await.unwrap();
        assert_eq!(h.source.calls(), 1);
        assert_eq!(cached, items);
    }

    #[tokio::test]
    async fn test_entry_is_written_with_fetch_time() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("Armor").await.unwrap();

        let raw = h.store.get("items:Armor").await.unwrap().unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.fetched_at, T0);
        assert_eq!(entry.items.len(), 3);
        assert!(raw.contains("\"fetchedAt\""));
    }

    #[tokio::test]
    async fn test_empty_category_shares_all_entry() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("").await.unwrap();
        h.cache.fetch("All").await.unwrap();
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("Armor").await.unwrap();
        h.cache.fetch("Gear").await.unwrap();
        h.cache.fetch("Armor").await.unwrap();
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_replaced() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.store.set("items:Armor", "{not json").await.unwrap();

        let items = h.cache.fetch("Armor").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(h.source.calls(), 1);

        let raw = h.store.get("items:Armor").await.unwrap().unwrap();
        assert!(serde_json::from_str::<CacheEntry>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_refreshed() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.store
            .set("items:Armor", r#"{"fetchedAt":-9223372036854775808,"items":[]}"#)
            .await
            .unwrap();

        let items = h.cache.fetch("Armor").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(h.source.calls(), 1);

        let stats = h.cache.stats().await.unwrap();
        assert_eq!(stats.fresh, 1);
    }

    #[test]
    fn test_entry_age_saturates() {
        let entry = CacheEntry {
            fetched_at: i64::MIN,
            items: Vec::new(),
        };
        assert_eq!(entry.age_ms(T0), i64::MAX);
        assert!(!entry.is_fresh(T0, DEFAULT_CACHE_TTL_MS));
    }

    #[tokio::test]
    async fn test_miscellaneous_maps_to_misc_sentinel() {
        let h = harness(CacheConfig::default(), CountingSource::default());

        h.cache.fetch("Miscellaneous").await.unwrap();
        assert_eq!(h.source.last_category.lock().unwrap().as_deref(), Some("Misc"));
        assert!(h.store.get("items:Misc").await.unwrap().is_some());

        h.cache.fetch("Misc").await.unwrap();
        assert_eq!(h.source.calls(), 1, "Both labels should share one entry");
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let source = CountingSource::default();
        source.fail.store(true, Ordering::SeqCst);
        let h = harness(CacheConfig::default(), source);

        let err = h.cache.fetch("Armor").await.unwrap_err();
        assert!(matches!(err, CatalogError::Upstream { .. }));
        assert!(h.store.get("items:Armor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_not_resurrected_by_default() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("Armor").await.unwrap();

        h.clock.advance(DEFAULT_CACHE_TTL_MS);
        h.source.fail.store(true, Ordering::SeqCst);
        assert!(h.cache.fetch("Armor").await.is_err());
    }

    #[tokio::test]
    async fn test_stale_fallback_when_enabled() {
        let config = CacheConfig {
            serve_stale_on_error: true,
            ..CacheConfig::default()
        };
        let h = harness(config, CountingSource::default());
        let fresh = h.cache.fetch("Armor").await.unwrap();

        h.clock.advance(DEFAULT_CACHE_TTL_MS * 2);
        h.source.fail.store(true, Ordering::SeqCst);
        let stale = h.cache.fetch("Armor").await.unwrap();
        assert_eq!(stale, fresh);
        assert_eq!(h.source.calls(), 2);

        // Nothing cached for this one, so the error still surfaces
        assert!(h.cache.fetch("Gear").await.is_err());
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let h = harness(config, CountingSource::default());

        h.cache.fetch("Armor").await.unwrap();
        h.clock.advance(1_000);
        h.cache.fetch("Gear").await.unwrap();
        h.clock.advance(1_000);
        h.cache.fetch("Melee Weapon").await.unwrap();

        assert!(h.store.get("items:Armor").await.unwrap().is_none());
        assert!(h.store.get("items:Gear").await.unwrap().is_some());
        assert!(h.store.get("items:Melee Weapon").await.unwrap().is_some());

        // Refreshing an existing category does not evict anything
        h.clock.advance(DEFAULT_CACHE_TTL_MS);
        h.cache.fetch("Gear").await.unwrap();
        assert_eq!(h.cache.stats().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("Armor").await.unwrap();
        h.cache.fetch("Gear").await.unwrap();
        h.store.set("unrelated", "keep me").await.unwrap();

        assert!(h.cache.invalidate("Armor").await.unwrap());
        assert!(!h.cache.invalidate("Armor").await.unwrap());
        h.cache.fetch("Armor").await.unwrap();
        assert_eq!(h.source.calls(), 3);

        assert_eq!(h.cache.clear().await.unwrap(), 2);
        assert_eq!(h.store.get("unrelated").await.unwrap().as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness(CacheConfig::default(), CountingSource::default());
        h.cache.fetch("Armor").await.unwrap();
        h.clock.advance(DEFAULT_CACHE_TTL_MS);
        h.cache.fetch("Gear").await.unwrap();
        h.store.set("items:Broken", "???").await.unwrap();

        let stats = h.cache.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.corrupted, 1);
        assert_eq!(stats.entries[0].category, "Armor");
        assert!(!stats.entries[0].fresh);
        assert_eq!(stats.entries[1].item_count, 3);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_returns_items() {
        let source = Arc::new(CountingSource::default());
        let cache = CategoryCache::new(Arc::new(NoopCacheStore), source.clone());

        let first = cache.fetch("Armor").await.unwrap();
        let second = cache.fetch("Armor").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_fetches_without_coalescing() {
        let source = CountingSource {
            delay_ms: 20,
            ..CountingSource::default()
        };
        let h = harness(CacheConfig::default(), source);

        let (a, b) = tokio::join!(h.cache.fetch("Armor"), h.cache.fetch("Armor"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_fetches_with_coalescing() {
        let source = CountingSource {
            delay_ms: 20,
            ..CountingSource::default()
        };
        let config = CacheConfig {
            coalesce_fetches: true,
            ..CacheConfig::default()
        };
        let h = harness(config, source);

        let (a, b) = tokio::join!(h.cache.fetch("Armor"), h.cache.fetch("Armor"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(h.source.calls(), 1);
    }
}
