//! # Key-Value Store
//!
//! The persistence seam the product cache and the history repository are
//! written against.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     dyn KeyValueStore                                   │
//! │                                                                         │
//! │   ┌───────────────────────────┐     ┌───────────────────────────┐      │
//! │   │ SqliteStore               │     │ MemoryStore               │      │
//! │   │  kv_entries table         │     │  RwLock<BTreeMap>         │      │
//! │   │  survives restarts        │     │  tests, no-disk hosts     │      │
//! │   └───────────────────────────┘     └───────────────────────────┘      │
//! │                                                                         │
//! │   Keys: "product:<ean13>"   cache entries                              │
//! │         "history:<ean13>"   scan history records                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are opaque bytes; callers own the encoding.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbResult;

/// Key prefix for cached product entries.
pub const PRODUCT_PREFIX: &str = "product:";

/// Key prefix for scan history records.
pub const HISTORY_PREFIX: &str = "history:";

/// Builds the cache key for a canonical barcode.
pub fn product_key(barcode: &str) -> String {
    format!("{}{}", PRODUCT_PREFIX, barcode)
}

/// Builds the history key for a canonical barcode.
pub fn history_key(barcode: &str) -> String {
    format!("{}{}", HISTORY_PREFIX, barcode)
}

/// One stored entry as returned by scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: String,
    pub value: Vec<u8>,
    /// Last time the entry was written.
    pub updated_at: DateTime<Utc>,
}

/// Async key-value persistence.
///
/// Implementations must make `put` an atomic replace: a reader sees the old
/// value or the new one, never a mix.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>>;

    /// Inserts or replaces a value.
    async fn put(&self, key: &str, value: &[u8]) -> DbResult<()>;

    /// Deletes a value. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> DbResult<bool>;

    /// All entries, ordered by key.
    async fn scan_all(&self) -> DbResult<Vec<StoredRecord>>;

    /// Entries whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<StoredRecord>> {
        let mut records = self.scan_all().await?;
        records.retain(|r| r.key.starts_with(prefix));
        Ok(records)
    }

    /// Deletes every entry whose key starts with `prefix`. Returns the count.
    async fn delete_prefix(&self, prefix: &str) -> DbResult<u64> {
        let mut removed = 0;
        for record in self.scan_prefix(prefix).await? {
            if self.delete(&record.key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespaces() {
        assert_eq!(product_key("4006381333931"), "product:4006381333931");
        assert_eq!(history_key("4006381333931"), "history:4006381333931");
    }
}
