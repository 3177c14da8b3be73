//! # Scan Service
//!
//! Background task that feeds camera and manual scans through the
//! pipeline, one at a time.
//!
//! ```text
//! ┌───────────────┐   ScanEvent    ┌───────────────────────┐   outcome   ┌──────────┐
//! │  ScanHandle   │ ─────────────► │  ScanService (task)   │ ──────────► │  Host    │
//! │  submit()     │   mpsc(32)     │                       │  mpsc(32)   │  UI      │
//! │  shutdown()   │ ─────────────► │  owns ONE resolution  │             │          │
//! └───────────────┘   mpsc(1)      │  future at a time     │             └──────────┘
//!                                  └───────────────────────┘
//! ```
//!
//! A new event drops the resolution in progress, which cancels it. Outcomes
//! therefore arrive in submission order and superseded scans deliver
//! nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use foodscan_core::Symbology;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{LookupError, LookupResult};
use crate::pipeline::{ResolutionOutcome, ResolutionPipeline};

const EVENT_CAPACITY: usize = 32;

/// Where a scan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Camera,
    Manual,
}

/// One scan submitted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Raw text as captured.
    pub raw: String,
    /// Symbology reported by the camera, if any.
    pub symbology: Option<Symbology>,
    pub source: ScanSource,
}

impl ScanEvent {
    pub fn camera(raw: impl Into<String>, symbology: Option<Symbology>) -> Self {
        ScanEvent {
            raw: raw.into(),
            symbology,
            source: ScanSource::Camera,
        }
    }

    pub fn manual(raw: impl Into<String>) -> Self {
        ScanEvent {
            raw: raw.into(),
            symbology: None,
            source: ScanSource::Manual,
        }
    }
}

type Resolution = Pin<Box<dyn Future<Output = Option<ResolutionOutcome>> + Send>>;

/// The background task. Created through [`ScanService::spawn`].
pub struct ScanService {
    pipeline: Arc<ResolutionPipeline>,
    events_rx: mpsc::Receiver<ScanEvent>,
    outcome_tx: mpsc::Sender<ResolutionOutcome>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for submitting scans to a running [`ScanService`].
#[derive(Debug, Clone)]
pub struct ScanHandle {
    events_tx: mpsc::Sender<ScanEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ScanService {
    /// Spawns the service and returns its handle and outcome receiver.
    pub fn spawn(
        pipeline: Arc<ResolutionPipeline>,
    ) -> (ScanHandle, mpsc::Receiver<ResolutionOutcome>) {
        let (events_tx, events_rx) = mpsc::channel::<ScanEvent>(EVENT_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::channel::<ResolutionOutcome>(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let service = ScanService {
            pipeline,
            events_rx,
            outcome_tx,
            shutdown_rx,
        };

        tokio::spawn(service.run());

        let handle = ScanHandle {
            events_tx,
            shutdown_tx,
        };

        (handle, outcome_rx)
    }

    async fn run(mut self) {
        info!("Scan service started");
        let mut current: Option<Resolution> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }

                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        debug!("All scan handles dropped");
                        break;
                    };
                    if current.is_some() {
                        debug!("Superseding resolution in progress");
                    }
                    // Replacing drops the previous future, which cancels it
                    current = Some(self.start(event));
                }

                outcome = next_outcome(&mut current), if current.is_some() => {
                    current = None;
                    let Some(outcome) = outcome else {
                        continue;
                    };
                    if self.outcome_tx.send(outcome).await.is_err() {
                        debug!("Outcome receiver dropped");
                        break;
                    }
                }
            }
        }

        info!("Scan service stopped");
    }

    fn start(&self, event: ScanEvent) -> Resolution {
        debug!(source = ?event.source, symbology = ?event.symbology, "Scan received");
        let pipeline = self.pipeline.clone();
        Box::pin(async move { pipeline.resolve_scan(&event.raw, event.symbology).await })
    }
}

async fn next_outcome(current: &mut Option<Resolution>) -> Option<ResolutionOutcome> {
    match current {
        Some(resolution) => resolution.await,
        None => std::future::pending().await,
    }
}

impl ScanHandle {
    /// Queues a scan. Fails once the service has stopped.
    pub async fn submit(&self, event: ScanEvent) -> LookupResult<()> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| LookupError::ShuttingDown)
    }

    /// Stops the service. The resolution in progress is cancelled.
    pub async fn shutdown(&self) -> LookupResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LookupError::ShuttingDown)
    }

    /// Returns true while the service task is running.
    pub fn is_running(&self) -> bool {
        !self.events_tx.is_closed()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ProductCache;
    use crate::clock::SystemClock;
    use crate::error::ResolveError;
    use crate::pipeline::OutcomeSource;
    use crate::testing::{FakeFetcher, FakeHistory};
    use foodscan_db::MemoryStore;
    use std::time::Duration;

    fn pipeline(fetcher: Arc<FakeFetcher>) -> Arc<ResolutionPipeline> {
        let cache = ProductCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            chrono::Duration::days(7),
        );
        Arc::new(
            ResolutionPipeline::builder(cache, fetcher, Arc::new(FakeHistory::default())).build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_outcomes_in_order() {
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.found("4006381333931", "Fineliner");
        let (handle, mut outcomes) = ScanService::spawn(pipeline(fetcher));

        handle
            .submit(ScanEvent::camera("4006381333931", Some(Symbology::Ean13)))
            .await
            .unwrap();
        let first = outcomes.recv().await.unwrap();
        assert!(matches!(
            first,
            ResolutionOutcome::Found { source: OutcomeSource::Network, .. }
        ));

        handle.submit(ScanEvent::manual("12")).await.unwrap();
        let second = outcomes.recv().await.unwrap();
        assert!(matches!(
            second,
            ResolutionOutcome::Failed(ResolveError::InvalidBarcode(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_scan_supersedes_pending_one() {
        let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_secs(5)));
        fetcher.found("4006381333931", "Fineliner");
        fetcher.found("0036000291452", "Cola");
        let (handle, mut outcomes) = ScanService::spawn(pipeline(fetcher.clone()));

        handle.submit(ScanEvent::manual("4006381333931")).await.unwrap();
        fetcher.started.notified().await;
        handle.submit(ScanEvent::manual("036000291452")).await.unwrap();

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome.product().map(|p| p.barcode.as_str()),
            Some("0036000291452")
        );
        assert_eq!(fetcher.calls(), 2);

        handle.shutdown().await.unwrap();
        assert!(outcomes.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let (handle, mut outcomes) = ScanService::spawn(pipeline(Arc::new(FakeFetcher::default())));

        handle.shutdown().await.unwrap();
        assert!(outcomes.recv().await.is_none());
        assert!(!handle.is_running());

        let err = handle.submit(ScanEvent::manual("4006381333931")).await.unwrap_err();
        assert!(matches!(err, LookupError::ShuttingDown));
    }
}
