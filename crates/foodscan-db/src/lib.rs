//! # foodscan-db: Persistence Layer for FoodScan
//!
//! This crate provides the key-value store behind the product cache and the
//! scan history. It uses SQLite through sqlx, with an in-memory backend for
//! tests.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FoodScan Data Flow                               │
//! │                                                                         │
//! │  ResolutionPipeline (foodscan-lookup)                                  │
//! │       │  ProductCache            HistoryLog                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   foodscan-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ KeyValueStore │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  SqliteStore  │    │  (embedded)  │  │   │
//! │  │   │               │───►│  MemoryStore  │    │ 001_kv.sql   │  │   │
//! │  │   │ SqlitePool    │    ├───────────────┤    │              │  │   │
//! │  │   │               │    │ HistoryRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file in the platform data directory                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`store`] - `KeyValueStore` trait and its backends
//! - [`repository`] - Scan history repository
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use foodscan_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("foodscan.db")).await?;
//! let store = db.store();
//! let recent = db.history().recent(20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::history::HistoryRepository;
pub use store::memory::MemoryStore;
pub use store::sqlite::SqliteStore;
pub use store::{KeyValueStore, StoredRecord};
