//! Test doubles shared by the pipeline and service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foodscan_core::{NormalizedBarcode, Product};
use foodscan_db::{DbResult, KeyValueStore, MemoryStore, StoredRecord};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::client::ProductFetcher;
use crate::error::FetchError;
use crate::pipeline::HistoryLog;

/// Scripted fetcher. Unknown barcodes answer `NotFound`.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub started: Notify,
    pub responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
}

impl FakeFetcher {
    pub fn with_delay(delay: Duration) -> Self {
        FakeFetcher {
            delay,
            ..FakeFetcher::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn respond(&self, ean13: &str, response: Result<Value, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(ean13.to_string(), response);
    }

    pub fn found(&self, ean13: &str, name: &str) {
        self.respond(ean13, Ok(json!({"status": 1, "product": {"product_name": name}})));
    }
}

#[async_trait]
impl ProductFetcher for FakeFetcher {
    async fn fetch_product(
        &self,
        barcode: &NormalizedBarcode,
        _locale: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        self.responses
            .lock()
            .unwrap()
            .get(barcode.code())
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

/// Records the barcode of every logged scan.
#[derive(Default)]
pub(crate) struct FakeHistory {
    scans: Mutex<Vec<String>>,
}

impl FakeHistory {
    pub fn scans(&self) -> Vec<String> {
        self.scans.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryLog for FakeHistory {
    async fn record_scan(&self, product: &Product, _at: DateTime<Utc>) -> DbResult<()> {
        self.scans.lock().unwrap().push(product.barcode.clone());
        Ok(())
    }
}

/// Memory store whose writes to one key stall for `delay`.
pub(crate) struct SlowStore {
    inner: MemoryStore,
    slow_key: String,
    delay: Duration,
    pub put_started: Notify,
}

impl SlowStore {
    pub fn new(slow_key: &str, delay: Duration) -> Self {
        SlowStore {
            inner: MemoryStore::new(),
            slow_key: slow_key.to_string(),
            delay,
            put_started: Notify::new(),
        }
    }
}

#[async_trait]
impl KeyValueStore for SlowStore {
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> DbResult<()> {
        if key == self.slow_key {
            self.put_started.notify_one();
            tokio::time::sleep(self.delay).await;
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> DbResult<bool> {
        self.inner.delete(key).await
    }

    async fn scan_all(&self) -> DbResult<Vec<StoredRecord>> {
        self.inner.scan_all().await
    }
}
