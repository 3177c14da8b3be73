//! # Lookup Error Types
//!
//! Error types for fetching and resolving products.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Lookup Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   FetchError    │  │  ResolveError   │  │     LookupError         │ │
//! │  │ (network fetch) │  │ (outcome.Failed)│  │ (host calls, config)    │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  InvalidBarcode │  │  InvalidConfig          │ │
//! │  │  Network...     │─►│  RateLimited    │  │  InvalidUrl             │ │
//! │  │  Timeout        │  │  Network...     │  │  ConfigLoad/SaveFailed  │ │
//! │  │  ServerError    │  │  Timeout        │  │  Storage / StorageBusy  │ │
//! │  │  RateLimit...   │  │  ServerError    │  │  HttpClient             │ │
//! │  │  DecodingFailed │  │  DecodingFailed │  │  ShuttingDown           │ │
//! │  │  Cancelled      │  │  Internal       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  FetchError::NotFound becomes ResolutionOutcome::NotFound and          │
//! │  FetchError::Cancelled becomes no outcome at all.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use foodscan_core::{InvalidBarcode, ValidationError};
use thiserror::Error;

/// Result type alias for host-facing lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Failure modes of the network-fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote database confirms it has no such product.
    #[error("product not found")]
    NotFound,

    /// No route to the server (offline, DNS failure, refused connection).
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an unexpected status.
    #[error("server error (HTTP {0})")]
    ServerError(u16),

    /// The server asked us to slow down (HTTP 429).
    #[error("upstream rate limit exceeded")]
    RateLimitExceeded,

    /// The body did not have the expected shape.
    #[error("could not decode product: {0}")]
    DecodingFailed(String),

    /// The request was superseded and aborted.
    #[error("request cancelled")]
    Cancelled,
}

// =============================================================================
// Resolve Errors
// =============================================================================

/// Why a resolution ended without a product or a not-found answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid barcode: {0}")]
    InvalidBarcode(#[from] InvalidBarcode),

    /// The upstream service rate-limited us.
    #[error("rate limited by product database")]
    RateLimited,

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("lookup timed out")]
    Timeout,

    #[error("product database error (HTTP {0})")]
    ServerError(u16),

    /// The remote payload had an unexpected shape. Logged as a defect.
    #[error("could not decode product data: {0}")]
    DecodingFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Returns true if calling `resolve` again with the same barcode may
    /// succeed.
    ///
    /// ## Retryable Errors
    /// - Upstream rate limiting
    /// - Network unavailable
    /// - Timeouts
    /// - Server errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::RateLimited
                | ResolveError::NetworkUnavailable
                | ResolveError::Timeout
                | ResolveError::ServerError(_)
        )
    }

    /// Returns true for failures that indicate a bug rather than bad input
    /// or a flaky network.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ResolveError::DecodingFailed(_) | ResolveError::Internal(_)
        )
    }

    /// Maps a fetch failure. `NotFound` and `Cancelled` are not errors at
    /// this level and yield `None`.
    pub fn from_fetch(err: FetchError) -> Option<Self> {
        match err {
            FetchError::NotFound | FetchError::Cancelled => None,
            FetchError::NetworkUnavailable => Some(ResolveError::NetworkUnavailable),
            FetchError::Timeout => Some(ResolveError::Timeout),
            FetchError::ServerError(code) => Some(ResolveError::ServerError(code)),
            FetchError::RateLimitExceeded => Some(ResolveError::RateLimited),
            FetchError::DecodingFailed(reason) => Some(ResolveError::DecodingFailed(reason)),
        }
    }
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// Errors from configuration and host-facing maintenance calls.
#[derive(Debug, Error)]
pub enum LookupError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid lookup configuration.
    #[error("Invalid lookup configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Store temporarily unavailable (pool exhausted, connection lost).
    #[error("Storage busy: {0}")]
    StorageBusy(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The scan service has stopped.
    #[error("Scan service is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<foodscan_db::DbError> for LookupError {
    fn from(err: foodscan_db::DbError) -> Self {
        if err.is_transient() {
            LookupError::StorageBusy(err.to_string())
        } else {
            LookupError::Storage(err.to_string())
        }
    }
}

impl From<ValidationError> for LookupError {
    fn from(err: ValidationError) -> Self {
        LookupError::InvalidConfig(err.to_string())
    }
}

impl From<url::ParseError> for LookupError {
    fn from(err: url::ParseError) -> Self {
        LookupError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for LookupError {
    fn from(err: std::io::Error) -> Self {
        LookupError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LookupError {
    fn from(err: toml::de::Error) -> Self {
        LookupError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LookupError {
    fn from(err: toml::ser::Error) -> Self {
        LookupError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::HttpClient(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl LookupError {
    /// Returns true if the operation can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::StorageBusy(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LookupError::InvalidConfig(_)
                | LookupError::InvalidUrl(_)
                | LookupError::ConfigLoadFailed(_)
                | LookupError::ConfigSaveFailed(_)
        )
    }
}
