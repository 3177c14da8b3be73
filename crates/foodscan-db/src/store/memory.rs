//! In-memory [`KeyValueStore`], for tests and hosts without a writable disk.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{KeyValueStore, StoredRecord};
use crate::error::DbResult;

/// Key-value store held in a sorted map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).map(|(v, _)| v.clone()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_vec(), Utc::now()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> DbResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn scan_all(&self) -> DbResult<Vec<StoredRecord>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, (value, updated_at))| StoredRecord {
                key: key.clone(),
                value: value.clone(),
                updated_at: *updated_at,
            })
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> DbResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.put("product:b", b"2").await.unwrap();
        store.put("product:a", b"1").await.unwrap();
        store.put("history:a", b"h").await.unwrap();

        assert_eq!(store.len().await, 3);
        assert_eq!(store.get("product:a").await.unwrap(), Some(b"1".to_vec()));

        let keys: Vec<_> = store
            .scan_prefix("product:")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["product:a", "product:b"]);

        assert_eq!(store.delete_prefix("product:").await.unwrap(), 2);
        assert!(store.delete("history:a").await.unwrap());
        assert!(store.is_empty().await);
    }
}
