//! # History Repository
//!
//! Scan history stored as JSON under `history:<ean13>` keys.
//!
//! ## Re-scan Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(new)                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  existing = get(new.barcode)                                           │
//! │       │                                                                 │
//! │       ├── None  ──► store new as-is                                    │
//! │       │                                                                 │
//! │       └── Some  ──► store new, but keep existing.id                    │
//! │                     and existing.is_favorite                           │
//! │                                                                         │
//! │  One entry per barcode. Display fields and scanned_at always follow   │
//! │  the latest scan.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use foodscan_core::HistoryRecord;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::store::{history_key, KeyValueStore, StoredRecord, HISTORY_PREFIX};

/// Repository for scan history.
///
/// ## Usage
/// ```rust,ignore
/// let history = db.history();
/// history.record(HistoryRecord::from_product(&product, Utc::now())).await?;
/// let latest = history.recent(20).await?;
/// ```
#[derive(Clone)]
pub struct HistoryRepository {
    store: Arc<dyn KeyValueStore>,
    /// Serialises read-modify-write cycles.
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for HistoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRepository").finish_non_exhaustive()
    }
}

impl HistoryRepository {
    /// Creates a repository over any key-value store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        HistoryRepository {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Records a scan, preserving id and favorite flag of an earlier scan of
    /// the same barcode. Returns the stored record.
    pub async fn record(&self, mut record: HistoryRecord) -> DbResult<HistoryRecord> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.read(&record.barcode).await? {
            record.id = existing.id;
            record.is_favorite = existing.is_favorite;
        }

        self.write(&record).await?;
        debug!(barcode = %record.barcode, id = %record.id, "Recorded scan");
        Ok(record)
    }

    /// Gets the history entry for a barcode.
    pub async fn get(&self, barcode: &str) -> DbResult<Option<HistoryRecord>> {
        self.read(barcode).await
    }

    /// Most recent scans first, at most `limit`.
    pub async fn recent(&self, limit: usize) -> DbResult<Vec<HistoryRecord>> {
        let mut records = self.all().await?;
        records.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Starred records, most recent first.
    pub async fn favorites(&self) -> DbResult<Vec<HistoryRecord>> {
        let mut records = self.all().await?;
        records.retain(|r| r.is_favorite);
        records.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
        Ok(records)
    }

    /// Sets or clears the favorite flag.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the barcode was never recorded.
    pub async fn set_favorite(&self, barcode: &str, favorite: bool) -> DbResult<HistoryRecord> {
        let _guard = self.write_lock.lock().await;

        let mut record = self
            .read(barcode)
            .await?
            .ok_or_else(|| DbError::not_found("History", barcode))?;

        record.is_favorite = favorite;
        self.write(&record).await?;
        Ok(record)
    }

    /// Removes one entry. Returns whether it existed.
    pub async fn delete(&self, barcode: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(&history_key(barcode)).await
    }

    /// Removes every history entry. Returns the count.
    pub async fn clear(&self) -> DbResult<u64> {
        let _guard = self.write_lock.lock().await;
        let removed = self.store.delete_prefix(HISTORY_PREFIX).await?;
        debug!(removed, "Cleared scan history");
        Ok(removed)
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// An undecodable entry reads as absent; the next `record` overwrites it.
    async fn read(&self, barcode: &str) -> DbResult<Option<HistoryRecord>> {
        let key = history_key(barcode);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring undecodable history entry");
                Ok(None)
            }
        }
    }

    async fn write(&self, record: &HistoryRecord) -> DbResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.store.put(&history_key(&record.barcode), &bytes).await
    }

    async fn all(&self) -> DbResult<Vec<HistoryRecord>> {
        let stored = self.store.scan_prefix(HISTORY_PREFIX).await?;
        Ok(stored.into_iter().filter_map(decode_listed).collect())
    }
}

/// Undecodable entries are skipped so one bad row can't hide the list.
fn decode_listed(stored: StoredRecord) -> Option<HistoryRecord> {
    match serde_json::from_slice(&stored.value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(key = %stored.key, error = %e, "Skipping undecodable history entry");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use foodscan_core::NutriScore;

    fn record(barcode: &str, name: &str, minute: u32) -> HistoryRecord {
        HistoryRecord {
            id: uuid_like(barcode, minute),
            barcode: barcode.to_string(),
            name: name.to_string(),
            brand: None,
            image_url: None,
            nutri_score: Some(NutriScore::B),
            nova_group: None,
            is_favorite: false,
            scanned_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    fn uuid_like(barcode: &str, minute: u32) -> String {
        format!("{}-{}", barcode, minute)
    }

    fn repo() -> (Arc<MemoryStore>, HistoryRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = HistoryRepository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn test_rescan_keeps_id_and_favorite() {
        let (_, repo) = repo();

        let first = repo.record(record("4006381333931", "Old", 0)).await.unwrap();
        repo.set_favorite("4006381333931", true).await.unwrap();

        let second = repo.record(record("4006381333931", "New", 5)).await.unwrap();

        assert_eq!(second.id, first.id);
        assert!(second.is_favorite);
        assert_eq!(second.name, "New");
        assert_eq!(repo.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let (_, repo) = repo();
        repo.record(record("0000096385074", "A", 1)).await.unwrap();
        repo.record(record("4006381333931", "B", 3)).await.unwrap();
        repo.record(record("0036000291452", "C", 2)).await.unwrap();

        let names: Vec<_> = repo
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_favorites_and_missing() {
        let (_, repo) = repo();
        repo.record(record("4006381333931", "A", 1)).await.unwrap();
        repo.record(record("0036000291452", "B", 2)).await.unwrap();
        repo.set_favorite("0036000291452", true).await.unwrap();

        let favorites = repo.favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].barcode, "0036000291452");

        let err = repo.set_favorite("0000096385074", true).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_clear_leave_other_namespaces() {
        let (store, repo) = repo();
        store.put("product:4006381333931", b"{}").await.unwrap();
        repo.record(record("4006381333931", "A", 1)).await.unwrap();
        repo.record(record("0036000291452", "B", 2)).await.unwrap();

        assert!(repo.delete("4006381333931").await.unwrap());
        assert!(!repo.delete("4006381333931").await.unwrap());
        assert_eq!(repo.clear().await.unwrap(), 1);

        assert!(repo.recent(10).await.unwrap().is_empty());
        assert!(store.get("product:4006381333931").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_skipped_in_listings() {
        let (store, repo) = repo();
        store.put("history:garbage", b"not json").await.unwrap();
        repo.record(record("4006381333931", "A", 1)).await.unwrap();

        assert_eq!(repo.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_overwritten_on_rescan() {
        let (store, repo) = repo();
        store.put("history:4006381333931", b"{truncated").await.unwrap();

        assert!(repo.get("4006381333931").await.unwrap().is_none());

        let saved = repo.record(record("4006381333931", "Pen", 4)).await.unwrap();
        assert_eq!(saved.id, "4006381333931-4");

        let stored = repo.get("4006381333931").await.unwrap().unwrap();
        assert_eq!(stored.name, "Pen");
    }

    #[tokio::test]
    async fn test_sqlite_backed_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.history();

        let mut rec = record("4006381333931", "A", 1);
        rec.scanned_at = rec.scanned_at + Duration::days(1);
        repo.record(rec.clone()).await.unwrap();

        assert_eq!(repo.get("4006381333931").await.unwrap(), Some(rec));
    }
}
