//! # Product Cache
//!
//! TTL-gated product cache over the key-value store.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  put(barcode, product)          get(barcode)                           │
//! │       │                              │                                  │
//! │       ▼                              ▼                                  │
//! │  cached_at = now              age = now − cached_at                    │
//! │  last_accessed_at = now             │                                   │
//! │  (full replace, TTL reset)          ├── age ≥ ttl ──► delete, None      │
//! │                                     │                                   │
//! │                                     └── age < ttl ──► last_accessed_at │
//! │                                                       = now, Some      │
//! │                                                                         │
//! │  evict_expired(days): sweep, delete age > days                         │
//! │  clear():             delete every product entry                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is enforced on read; sweeps are maintenance only.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use foodscan_core::{NormalizedBarcode, Product};
use foodscan_db::store::{product_key, PRODUCT_PREFIX};
use foodscan_db::{DbResult, KeyValueStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Default time-to-live for cached products.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// One cached product as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub barcode: String,
    pub payload: Product,
    pub cached_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Product cache keyed by canonical barcode.
#[derive(Clone)]
pub struct ProductCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// Serialises read-modify-write on entries.
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ProductCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ProductCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        ProductCache {
            store,
            clock,
            ttl,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached product if present and younger than the TTL.
    ///
    /// ## Rules
    /// - Absent → `None`
    /// - `now - cached_at >= ttl` → entry deleted, `None`
    /// - Undecodable entry → deleted, `None`
    /// - Otherwise `last_accessed_at` is bumped and the payload returned
    pub async fn get(&self, barcode: &NormalizedBarcode) -> DbResult<Option<Product>> {
        let key = product_key(barcode.code());
        let _guard = self.write_lock.lock().await;

        let Some(bytes) = self.store.get(&key).await? else {
            debug!(barcode = %barcode, "Cache miss");
            return Ok(None);
        };

        let mut entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Dropping undecodable cache entry");
                self.store.delete(&key).await?;
                return Ok(None);
            }
        };

        let now = self.clock.now();
        if now - entry.cached_at >= self.ttl {
            debug!(barcode = %barcode, cached_at = %entry.cached_at, "Cache entry expired");
            self.store.delete(&key).await?;
            return Ok(None);
        }

        // cached_at ≤ last_accessed_at even if the wall clock stepped back
        entry.last_accessed_at = now.max(entry.cached_at);
        self.store.put(&key, &serde_json::to_vec(&entry)?).await?;

        debug!(barcode = %barcode, "Cache hit");
        Ok(Some(entry.payload))
    }

    /// Inserts or fully replaces the entry, restarting its TTL.
    pub async fn put(&self, barcode: &NormalizedBarcode, product: &Product) -> DbResult<()> {
        let now = self.clock.now();
        let entry = CacheEntry {
            barcode: barcode.code().to_string(),
            payload: product.clone(),
            cached_at: now,
            last_accessed_at: now,
        };
        let bytes = serde_json::to_vec(&entry)?;

        let _guard = self.write_lock.lock().await;
        self.store.put(&product_key(barcode.code()), &bytes).await?;

        debug!(barcode = %barcode, "Cached product");
        Ok(())
    }

    /// Reads an entry with its timestamps, without touching it or
    /// enforcing the TTL. An undecodable entry reads as absent and is left
    /// for the next `get` to drop.
    pub async fn peek(&self, barcode: &NormalizedBarcode) -> DbResult<Option<CacheEntry>> {
        let Some(bytes) = self.store.get(&product_key(barcode.code())).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Deletes entries older than `older_than_days`. Undecodable entries
    /// are deleted too. Returns the number deleted.
    pub async fn evict_expired(&self, older_than_days: u32) -> DbResult<u64> {
        let threshold = Duration::days(i64::from(older_than_days));
        let now = self.clock.now();

        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        for stored in self.store.scan_prefix(PRODUCT_PREFIX).await? {
            let stale = match serde_json::from_slice::<CacheEntry>(&stored.value) {
                Ok(entry) => now - entry.cached_at > threshold,
                Err(_) => true,
            };

            if stale && self.store.delete(&stored.key).await? {
                removed += 1;
            }
        }

        debug!(removed, older_than_days, "Evicted expired cache entries");
        Ok(removed)
    }

    /// Deletes every cached product. Returns the number deleted.
    pub async fn clear(&self) -> DbResult<u64> {
        let _guard = self.write_lock.lock().await;
        let removed = self.store.delete_prefix(PRODUCT_PREFIX).await?;
        debug!(removed, "Cleared product cache");
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use foodscan_core::barcode::validate;
    use foodscan_db::MemoryStore;
    use std::collections::BTreeMap;

    fn product(barcode: &str, name: &str) -> Product {
        Product {
            barcode: barcode.to_string(),
            name: Some(name.to_string()),
            generic_name: None,
            brand: None,
            quantity: None,
            ingredients_text: None,
            allergens: vec![],
            traces: vec![],
            categories: vec![],
            nova_group: None,
            nutri_score: None,
            nutriments: BTreeMap::new(),
            image_url: None,
            locale: "en".to_string(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, ManualClock, ProductCache) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        let cache = ProductCache::new(
            store.clone(),
            Arc::new(clock.clone()),
            Duration::days(DEFAULT_TTL_DAYS),
        );
        (store, clock, cache)
    }

    #[tokio::test]
    async fn test_hit_before_ttl_miss_at_ttl() {
        let (store, clock, cache) = setup();
        let barcode = validate("4006381333931").unwrap();
        cache.put(&barcode, &product("4006381333931", "Pen")).await.unwrap();

        clock.advance(Duration::days(7) - Duration::milliseconds(1));
        assert!(cache.get(&barcode).await.unwrap().is_some());

        clock.advance(Duration::milliseconds(1));
        assert!(cache.get(&barcode).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_hit_updates_last_accessed() {
        let (_, clock, cache) = setup();
        let barcode = validate("4006381333931").unwrap();
        cache.put(&barcode, &product("4006381333931", "Pen")).await.unwrap();
        let cached_at = clock.now();

        clock.advance(Duration::hours(3));
        cache.get(&barcode).await.unwrap();

        let entry = cache.peek(&barcode).await.unwrap().unwrap();
        assert_eq!(entry.cached_at, cached_at);
        assert_eq!(entry.last_accessed_at, cached_at + Duration::hours(3));
    }

    #[tokio::test]
    async fn test_put_replaces_and_resets_ttl() {
        let (_, clock, cache) = setup();
        let barcode = validate("4006381333931").unwrap();
        cache.put(&barcode, &product("4006381333931", "Old")).await.unwrap();

        clock.advance(Duration::days(6));
        cache.put(&barcode, &product("4006381333931", "New")).await.unwrap();

        clock.advance(Duration::days(6));
        let hit = cache.get(&barcode).await.unwrap().unwrap();
        assert_eq!(hit.name.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (store, _, cache) = setup();
        let barcode = validate("4006381333931").unwrap();
        store.put("product:4006381333931", b"{broken").await.unwrap();

        assert!(cache.get(&barcode).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_peek_leaves_corrupt_entry_for_get() {
        let (store, _, cache) = setup();
        let barcode = validate("4006381333931").unwrap();
        store.put("product:4006381333931", b"{broken").await.unwrap();

        assert!(cache.peek(&barcode).await.unwrap().is_none());
        assert!(store.get("product:4006381333931").await.unwrap().is_some());

        assert!(cache.get(&barcode).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_and_clear_only_touch_products() {
        let (store, clock, cache) = setup();
        let old = validate("4006381333931").unwrap();
        let fresh = validate("036000291452").unwrap();
        store.put("history:4006381333931", b"{}").await.unwrap();

        cache.put(&old, &product(old.code(), "Old")).await.unwrap();
        clock.advance(Duration::days(40));
        cache.put(&fresh, &product(fresh.code(), "Fresh")).await.unwrap();

        assert_eq!(cache.evict_expired(30).await.unwrap(), 1);
        assert!(cache.peek(&old).await.unwrap().is_none());
        assert!(cache.peek(&fresh).await.unwrap().is_some());

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}
