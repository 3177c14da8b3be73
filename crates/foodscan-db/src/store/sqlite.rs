//! SQLite-backed [`KeyValueStore`] over the `kv_entries` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{KeyValueStore, StoredRecord};
use crate::error::DbResult;

type Row = (String, Vec<u8>, DateTime<Utc>);

/// Key-value store persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a store over an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

fn into_record((key, value, updated_at): Row) -> StoredRecord {
    StoredRecord {
        key,
        value,
        updated_at,
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> DbResult<()> {
        // Single statement upsert: readers never observe a half-written row
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, bytes = value.len(), "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_all(&self) -> DbResult<Vec<StoredRecord>> {
        let rows: Vec<Row> =
            sqlx::query_as("SELECT key, value, updated_at FROM kv_entries ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<StoredRecord>> {
        // substr instead of LIKE so '_' and '%' in keys need no escaping
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT key, value, updated_at FROM kv_entries
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1")
            .bind(prefix)
            .execute(&self.pool)
            .await?;

        debug!(prefix = %prefix, removed = result.rows_affected(), "Deleted entries by prefix");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn store() -> SqliteStore {
        Database::new(DbConfig::in_memory()).await.unwrap().store()
    }

    #[tokio::test]
    async fn test_put_get_replace() {
        let store = store().await;
        assert_eq!(store.get("product:1").await.unwrap(), None);

        store.put("product:1", b"first").await.unwrap();
        store.put("product:1", b"second").await.unwrap();

        assert_eq!(store.get("product:1").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.scan_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        store.put("history:1", b"x").await.unwrap();

        assert!(store.delete("history:1").await.unwrap());
        assert!(!store.delete("history:1").await.unwrap());
        assert_eq!(store.get("history:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_and_delete() {
        let store = store().await;
        store.put("product:2", b"b").await.unwrap();
        store.put("product:1", b"a").await.unwrap();
        store.put("history:1", b"h").await.unwrap();
        store.put("product_x", b"not a product").await.unwrap();

        let products = store.scan_prefix("product:").await.unwrap();
        let keys: Vec<_> = products.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["product:1", "product:2"]);

        assert_eq!(store.delete_prefix("product:").await.unwrap(), 2);
        assert_eq!(store.scan_all().await.unwrap().len(), 2);
        assert!(store.get("history:1").await.unwrap().is_some());
    }
}
