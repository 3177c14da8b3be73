//! # Resolution Pipeline
//!
//! Turns a raw scan into a [`ResolutionOutcome`]: cache first, then a
//! rate-limited network lookup, then cache write-back and history.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Idle ──► Validating ──► CacheLookup ──► hit ──────────────────► Done  │
//! │               │               │                                   ▲     │
//! │               │ invalid       │ miss                              │     │
//! │               ▼               ▼                                   │     │
//! │             Done        RateLimitWait ──► Fetching ──► not found ─┤     │
//! │                                              │                    │     │
//! │                                              ├──► error ──────────┤     │
//! │                                              │                    │     │
//! │                                              └──► WritingBack ────┘     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single-Flight and Cooldown
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve(X) arrives                                                     │
//! │       │                                                                 │
//! │       ├── X already in flight ───────────► wait for that flight        │
//! │       │                                                                 │
//! │       ├── other barcode in flight ───────► cancel it (no outcome,      │
//! │       │                                     no write-back, no history) │
//! │       │                                                                 │
//! │       ├── X completed < cooldown ago and   ► reuse that outcome        │
//! │       │   outcome is not retryable                                      │
//! │       │                                                                 │
//! │       └── otherwise ─────────────────────► start a new flight          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `resolve` returns `None` when the request was superseded or cancelled.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foodscan_core::barcode::{validate, validate_with_symbology};
use foodscan_core::error::BarcodeResult;
use foodscan_core::locale::language_code;
use foodscan_core::{HistoryRecord, NormalizedBarcode, Product, Symbology};
use foodscan_db::{DbResult, HistoryRepository, KeyValueStore};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::ProductCache;
use crate::client::{OpenFoodFactsClient, ProductFetcher};
use crate::clock::{Clock, SystemClock};
use crate::config::LookupConfig;
use crate::error::{FetchError, LookupResult, ResolveError};
use crate::network::NetworkMonitor;
use crate::rate_limiter::RateLimiter;
use crate::record::build_product;

/// Default window in which a repeat scan reuses the last result.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1500);

// =============================================================================
// History Collaborator
// =============================================================================

/// Where resolved products are logged. The pipeline never reads it back.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn record_scan(&self, product: &Product, scanned_at: DateTime<Utc>) -> DbResult<()>;
}

#[async_trait]
impl HistoryLog for HistoryRepository {
    async fn record_scan(&self, product: &Product, scanned_at: DateTime<Utc>) -> DbResult<()> {
        self.record(HistoryRecord::from_product(product, scanned_at))
            .await
            .map(|_| ())
    }
}

// =============================================================================
// States and Outcomes
// =============================================================================

/// Progress of the current resolution, for host spinners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Idle,
    Validating,
    CacheLookup,
    RateLimitWait,
    Fetching,
    WritingBack,
    Done,
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionState::Idle => write!(f, "idle"),
            ResolutionState::Validating => write!(f, "validating"),
            ResolutionState::CacheLookup => write!(f, "cache_lookup"),
            ResolutionState::RateLimitWait => write!(f, "rate_limit_wait"),
            ResolutionState::Fetching => write!(f, "fetching"),
            ResolutionState::WritingBack => write!(f, "writing_back"),
            ResolutionState::Done => write!(f, "done"),
        }
    }
}

/// Where a found product came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Cache,
    Network,
}

/// Terminal result of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// A display-ready product.
    Found {
        product: Product,
        source: OutcomeSource,
    },

    /// The remote database has no such product. Hosts offer the user a
    /// way to contribute it.
    NotFound { barcode: NormalizedBarcode },

    /// Anything else.
    Failed(ResolveError),
}

impl ResolutionOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            ResolutionOutcome::Found { product, .. } => Some(product),
            _ => None,
        }
    }

    /// True when the host should show the "add this product" affordance.
    pub fn offers_contribution(&self) -> bool {
        matches!(self, ResolutionOutcome::NotFound { .. })
    }

    /// True when resolving the same barcode again may give a better answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolutionOutcome::Failed(e) if e.is_retryable())
    }
}

// =============================================================================
// Internal Bookkeeping
// =============================================================================

struct InFlight {
    id: Uuid,
    barcode: String,
    token: CancellationToken,
    result: watch::Receiver<Option<ResolutionOutcome>>,
}

struct Completed {
    barcode: String,
    outcome: ResolutionOutcome,
    completed_at: Instant,
}

struct Inner {
    in_flight: Option<InFlight>,
    last_completed: Option<Completed>,
    preferred_locale: String,
}

struct Flight {
    id: Uuid,
    token: CancellationToken,
    result_tx: watch::Sender<Option<ResolutionOutcome>>,
    locale: String,
}

enum Claim {
    Coalesced(ResolutionOutcome),
    Join(watch::Receiver<Option<ResolutionOutcome>>),
    Run(Flight),
}

/// Clears the in-flight slot when a flight ends, however it ends. Dropping
/// a `resolve` future mid-way cancels the flight through this guard.
struct FlightGuard<'a> {
    pipeline: &'a ResolutionPipeline,
    id: Uuid,
    token: CancellationToken,
}

impl FlightGuard<'_> {
    fn finish(
        self,
        barcode: &NormalizedBarcode,
        outcome: Option<ResolutionOutcome>,
        result_tx: watch::Sender<Option<ResolutionOutcome>>,
    ) -> Option<ResolutionOutcome> {
        let outcome = outcome?;

        let committed = {
            let mut inner = self.pipeline.lock();
            let current = inner.in_flight.as_ref().is_some_and(|f| f.id == self.id)
                && !self.token.is_cancelled();
            if current {
                inner.in_flight = None;
                inner.last_completed = Some(Completed {
                    barcode: barcode.code().to_string(),
                    outcome: outcome.clone(),
                    completed_at: Instant::now(),
                });
            }
            current
        };

        if !committed {
            return None;
        }

        // No receivers is fine: nobody joined this flight
        let _ = result_tx.send(Some(outcome.clone()));
        self.pipeline.publish(ResolutionState::Done);
        Some(outcome)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.pipeline.lock();
        if inner.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            debug!(request_id = %self.id, "Lookup dropped before completion");
            self.token.cancel();
            inner.in_flight = None;
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Orchestrates cache, rate limiter, fetcher and history for scans.
///
/// Share behind an `Arc`; every method takes `&self`.
///
/// ## Usage
/// ```rust,ignore
/// let pipeline = ResolutionPipeline::from_config(&config, store, history)?;
/// match pipeline.resolve("4006381333931").await {
///     Some(ResolutionOutcome::Found { product, .. }) => show(product),
///     Some(ResolutionOutcome::NotFound { .. }) => offer_contribution(),
///     Some(ResolutionOutcome::Failed(e)) if e.is_retryable() => offer_retry(),
///     Some(ResolutionOutcome::Failed(e)) => show_error(e),
///     None => {} // superseded by a newer scan
/// }
/// ```
pub struct ResolutionPipeline {
    cache: ProductCache,
    limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn ProductFetcher>,
    history: Arc<dyn HistoryLog>,
    network: NetworkMonitor,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ResolutionState>,
}

impl std::fmt::Debug for ResolutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionPipeline")
            .field("cooldown", &self.cooldown)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ResolutionPipeline {
    /// Starts building a pipeline from its required collaborators.
    pub fn builder(
        cache: ProductCache,
        fetcher: Arc<dyn ProductFetcher>,
        history: Arc<dyn HistoryLog>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            cache,
            fetcher,
            history,
            limiter: None,
            network: None,
            clock: None,
            cooldown: DEFAULT_COOLDOWN,
            preferred_locale: "en".to_string(),
        }
    }

    /// Wires a pipeline against Open Food Facts from configuration.
    pub fn from_config(
        config: &LookupConfig,
        store: Arc<dyn KeyValueStore>,
        history: Arc<dyn HistoryLog>,
    ) -> LookupResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = ProductCache::new(store, clock.clone(), config.cache_ttl());
        let fetcher = Arc::new(OpenFoodFactsClient::new(&config.api)?);
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.capacity,
            config.rate_window(),
        ));

        Ok(Self::builder(cache, fetcher, history)
            .rate_limiter(limiter)
            .clock(clock)
            .cooldown(config.cooldown())
            .preferred_locale(language_code(&config.pipeline.preferred_locale)?)
            .build())
    }

    // =========================================================================
    // Host Operations
    // =========================================================================

    /// Validates and normalizes a barcode without resolving it.
    pub fn validate_barcode(&self, raw: &str) -> BarcodeResult<NormalizedBarcode> {
        validate(raw)
    }

    /// Resolves a raw barcode. `None` means the request was superseded.
    pub async fn resolve(&self, raw: &str) -> Option<ResolutionOutcome> {
        self.resolve_scan(raw, None).await
    }

    /// Resolves a scan, using the symbology reported by the camera.
    pub async fn resolve_scan(
        &self,
        raw: &str,
        symbology: Option<Symbology>,
    ) -> Option<ResolutionOutcome> {
        self.publish(ResolutionState::Validating);

        let barcode = match validate_with_symbology(raw, symbology) {
            Ok(barcode) => barcode,
            Err(e) => {
                debug!(error = %e, "Rejected barcode");
                self.cancel_in_flight("invalid barcode");
                self.publish(ResolutionState::Done);
                return Some(ResolutionOutcome::Failed(e.into()));
            }
        };

        let flight = match self.claim(&barcode) {
            Claim::Coalesced(outcome) => {
                debug!(barcode = %barcode, "Reusing result within cooldown");
                self.publish(ResolutionState::Done);
                return Some(outcome);
            }
            Claim::Join(mut result) => {
                debug!(barcode = %barcode, "Joining in-flight lookup");
                let outcome = result
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|r| (*r).clone());
                return outcome;
            }
            Claim::Run(flight) => flight,
        };

        debug!(barcode = %barcode, request_id = %flight.id, "Starting lookup");
        let guard = FlightGuard {
            pipeline: self,
            id: flight.id,
            token: flight.token.clone(),
        };

        let outcome = self.run(&barcode, &flight.locale, &flight.token).await;
        if outcome.is_none() {
            debug!(barcode = %barcode, request_id = %flight.id, "Lookup cancelled");
        }
        guard.finish(&barcode, outcome, flight.result_tx)
    }

    /// Cancels the in-flight request, if any. Returns whether one existed.
    pub fn cancel(&self) -> bool {
        let cancelled = self.cancel_in_flight("cancelled by host");
        if cancelled {
            self.publish(ResolutionState::Idle);
        }
        cancelled
    }

    /// Deletes every cached product. Returns the number deleted.
    pub async fn clear_cache(&self) -> LookupResult<u64> {
        self.forget_last_result();
        Ok(self.cache.clear().await?)
    }

    /// Deletes cached products older than `older_than_days`.
    pub async fn evict_expired_cache(&self, older_than_days: u32) -> LookupResult<u64> {
        self.forget_last_result();
        Ok(self.cache.evict_expired(older_than_days).await?)
    }

    /// Changes the locale used for subsequent lookups.
    pub fn set_preferred_locale(&self, tag: &str) -> LookupResult<()> {
        let locale = language_code(tag)?;
        let mut inner = self.lock();
        if inner.preferred_locale != locale {
            info!(locale = %locale, "Preferred locale changed");
            inner.preferred_locale = locale;
            inner.last_completed = None;
        }
        Ok(())
    }

    pub fn preferred_locale(&self) -> String {
        self.lock().preferred_locale.clone()
    }

    /// Current state.
    pub fn state(&self) -> ResolutionState {
        *self.state_tx.borrow()
    }

    /// Receiver for state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ResolutionState> {
        self.state_tx.subscribe()
    }

    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    fn claim(&self, barcode: &NormalizedBarcode) -> Claim {
        let mut inner = self.lock();

        if let Some(flight) = &inner.in_flight {
            if flight.barcode == barcode.code() {
                return Claim::Join(flight.result.clone());
            }
        }

        if let Some(flight) = inner.in_flight.take() {
            info!(superseded = %flight.barcode, by = %barcode, "Cancelling superseded lookup");
            flight.token.cancel();
        }

        if let Some(done) = &inner.last_completed {
            if done.barcode == barcode.code()
                && done.completed_at.elapsed() < self.cooldown
                && !done.outcome.is_retryable()
            {
                return Claim::Coalesced(done.outcome.clone());
            }
        }

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let (result_tx, result) = watch::channel(None);

        inner.in_flight = Some(InFlight {
            id,
            barcode: barcode.code().to_string(),
            token: token.clone(),
            result,
        });

        Claim::Run(Flight {
            id,
            token,
            result_tx,
            locale: inner.preferred_locale.clone(),
        })
    }

    /// The flight body. Returns `None` once `token` is cancelled; nothing is
    /// written after that point.
    async fn run(
        &self,
        barcode: &NormalizedBarcode,
        locale: &str,
        token: &CancellationToken,
    ) -> Option<ResolutionOutcome> {
        self.publish(ResolutionState::CacheLookup);

        match self.cache.get(barcode).await {
            Ok(Some(product)) => {
                if token.is_cancelled() {
                    return None;
                }
                self.log_history(&product).await;
                return Some(ResolutionOutcome::Found {
                    product,
                    source: OutcomeSource::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(barcode = %barcode, error = %e, "Cache read failed, treating as miss"),
        }

        if token.is_cancelled() {
            return None;
        }

        if !self.network.is_online() {
            debug!(barcode = %barcode, "Offline, skipping network lookup");
            return Some(ResolutionOutcome::Failed(ResolveError::NetworkUnavailable));
        }

        self.publish(ResolutionState::RateLimitWait);
        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = self.limiter.admit() => {}
        }

        self.publish(ResolutionState::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            result = self.fetcher.fetch_product(barcode, locale, token) => result,
        };

        if token.is_cancelled() {
            return None;
        }

        let product = match fetched.and_then(|response| build_product(barcode, &response, locale)) {
            Ok(product) => product,
            Err(FetchError::Cancelled) => return None,
            Err(FetchError::NotFound) => {
                info!(barcode = %barcode, "Product not in remote database");
                return Some(ResolutionOutcome::NotFound {
                    barcode: barcode.clone(),
                });
            }
            Err(err) => {
                let err = ResolveError::from_fetch(err)
                    .unwrap_or_else(|| ResolveError::Internal("unclassified fetch error".into()));
                if err.is_internal() {
                    error!(barcode = %barcode, error = %err, "Remote product could not be decoded");
                } else {
                    warn!(barcode = %barcode, error = %err, "Product lookup failed");
                }
                return Some(ResolutionOutcome::Failed(err));
            }
        };

        if token.is_cancelled() {
            return None;
        }

        self.publish(ResolutionState::WritingBack);
        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            result = self.cache.put(barcode, &product) => {
                if let Err(e) = result {
                    warn!(barcode = %barcode, error = %e, "Cache write-back failed");
                }
            }
        }

        if token.is_cancelled() {
            return None;
        }
        self.log_history(&product).await;

        Some(ResolutionOutcome::Found {
            product,
            source: OutcomeSource::Network,
        })
    }

    async fn log_history(&self, product: &Product) {
        match self.history.record_scan(product, self.clock.now()).await {
            Ok(()) => debug!(barcode = %product.barcode, "Recorded scan history"),
            Err(e) => warn!(barcode = %product.barcode, error = %e, "Failed to record scan history"),
        }
    }

    fn cancel_in_flight(&self, reason: &str) -> bool {
        match self.lock().in_flight.take() {
            Some(flight) => {
                info!(barcode = %flight.barcode, reason, "Cancelling in-flight lookup");
                flight.token.cancel();
                true
            }
            None => false,
        }
    }

    fn forget_last_result(&self) {
        self.lock().last_completed = None;
    }

    fn publish(&self, state: ResolutionState) {
        self.state_tx.send_replace(state);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain bookkeeping; a panic elsewhere can't leave it torn
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ResolutionPipeline`].
pub struct PipelineBuilder {
    cache: ProductCache,
    fetcher: Arc<dyn ProductFetcher>,
    history: Arc<dyn HistoryLog>,
    limiter: Option<Arc<RateLimiter>>,
    network: Option<NetworkMonitor>,
    clock: Option<Arc<dyn Clock>>,
    cooldown: Duration,
    preferred_locale: String,
}

impl PipelineBuilder {
    /// Shares a rate limiter with other pipelines. Default: 100 per 60 s.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Default: always online.
    pub fn network(mut self, network: NetworkMonitor) -> Self {
        self.network = Some(network);
        self
    }

    /// Clock for history timestamps. Default: system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Default: 1.5 s.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Language code for localized fields. Default: "en".
    pub fn preferred_locale(mut self, locale: impl Into<String>) -> Self {
        self.preferred_locale = locale.into();
        self
    }

    pub fn build(self) -> ResolutionPipeline {
        let (state_tx, _) = watch::channel(ResolutionState::Idle);
        ResolutionPipeline {
            cache: self.cache,
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::new(100, Duration::from_secs(60)))),
            fetcher: self.fetcher,
            history: self.history,
            network: self.network.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cooldown: self.cooldown,
            inner: Mutex::new(Inner {
                in_flight: None,
                last_completed: None,
                preferred_locale: self.preferred_locale,
            }),
            state_tx,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
