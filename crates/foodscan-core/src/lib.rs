//! # foodscan-core: Pure Logic for FoodScan
//!
//! This crate holds everything about a scan that can be decided without
//! touching a disk or a network: is the barcode real, what is its
//! canonical form, and which localized text should a product card show.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FoodScan Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host App (camera, UI, settings)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ScanEvent / resolve()                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        foodscan-lookup (pipeline, cache, rate limiter)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ foodscan-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  barcode  │  │  locale   │  │   types   │  │   error   │  │   │
//! │  │   │ checksum  │  │ fallback  │  │  Product  │  │  Invalid  │  │   │
//! │  │   │  UPC-E    │  │  chain    │  │  History  │  │  Barcode  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`barcode`] - Checksum validation, UPC-E expansion, EAN-13 normalization
//! - [`locale`] - Locale fallback chain for localized product fields
//! - [`types`] - Domain types (Product, HistoryRecord, NutriScore, NovaGroup)
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use foodscan_core::barcode::validate;
//! use foodscan_core::locale::{select, LocalizedCandidates};
//!
//! let barcode = validate("036000291452").unwrap();
//! assert_eq!(barcode.code(), "0036000291452");
//!
//! let name = LocalizedCandidates::new().with_default("Lait demi-écrémé");
//! assert_eq!(select("de", &name).as_deref(), Some("Lait demi-écrémé"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod error;
pub mod locale;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use barcode::{NormalizedBarcode, Symbology};
pub use error::{InvalidBarcode, ValidationError};
pub use types::*;
