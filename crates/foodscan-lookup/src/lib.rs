//! # foodscan-lookup: Scan Resolution for FoodScan
//!
//! This crate turns a scanned barcode into a display-ready product. It
//! owns the cache-first lookup flow, the client-side rate limit against
//! Open Food Facts, and the background service that feeds camera scans
//! through it.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scan Resolution Flow                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ScanService (background task)                    │  │
//! │  │  ScanEvent in ──► one resolution at a time ──► outcome out       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                    ResolutionPipeline                            │  │
//! │  │  validate ─► cache ─► rate limit ─► fetch ─► write-back/history  │  │
//! │  │  single-flight • cooldown coalescing • cancellation              │  │
//! │  └──────┬──────────────┬───────────────┬──────────────┬─────────────┘  │
//! │         ▼              ▼               ▼              ▼                 │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────┐ ┌────────────────┐     │
//! │  │ProductCache│ │RateLimiter │ │ProductFetcher│ │  HistoryLog    │     │
//! │  │ TTL over   │ │ token      │ │ Open Food    │ │ foodscan-db    │     │
//! │  │ KV store   │ │ bucket     │ │ Facts (HTTP) │ │ repository     │     │
//! │  └────────────┘ └────────────┘ └──────────────┘ └────────────────┘     │
//! │                                                                         │
//! │  Injected capabilities: Clock (TTL), NetworkMonitor (reachability)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`] - `ResolutionPipeline`, outcomes, states, `HistoryLog`
//! - [`service`] - `ScanService` background task and `ScanHandle`
//! - [`cache`] - TTL product cache over the key-value store
//! - [`rate_limiter`] - Token-bucket limiter for outbound lookups
//! - [`client`] - `ProductFetcher` trait and the Open Food Facts client
//! - [`record`] - Remote response to `Product` mapping
//! - [`network`] - Reachability capability
//! - [`clock`] - Wall-clock capability
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - Fetch, resolution and service errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use foodscan_db::{Database, DbConfig};
//! use foodscan_lookup::{LookupConfig, ResolutionPipeline};
//! use std::sync::Arc;
//!
//! let config = LookupConfig::load_or_default(None);
//! let path = config.database_path().expect("no data directory");
//! let db = Database::new(DbConfig::new(path)).await?;
//!
//! let pipeline = ResolutionPipeline::from_config(
//!     &config,
//!     Arc::new(db.store()),
//!     Arc::new(db.history()),
//! )?;
//!
//! if let Some(outcome) = pipeline.resolve("3017620422003").await {
//!     println!("{:?}", outcome);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod rate_limiter;
pub mod record;
pub mod service;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CacheEntry, ProductCache};
pub use client::{OpenFoodFactsClient, ProductFetcher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LookupConfig;
pub use error::{FetchError, LookupError, LookupResult, ResolveError};
pub use network::NetworkMonitor;
pub use pipeline::{
    HistoryLog, OutcomeSource, PipelineBuilder, ResolutionOutcome, ResolutionPipeline,
    ResolutionState,
};
pub use rate_limiter::RateLimiter;
pub use service::{ScanEvent, ScanHandle, ScanService, ScanSource};
