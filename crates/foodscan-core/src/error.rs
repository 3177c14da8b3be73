//! # Error Types
//!
//! Domain-specific error types for foodscan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  foodscan-core errors (this file)                                      │
//! │  ├── InvalidBarcode   - Scan/manual input rejected (terminal)          │
//! │  └── ValidationError  - Malformed locale tags, grades, levels          │
//! │                                                                         │
//! │  foodscan-db errors (separate crate)                                   │
//! │  └── DbError          - Store operation failures                       │
//! │                                                                         │
//! │  foodscan-lookup errors (separate crate)                               │
//! │  ├── FetchError       - Network collaborator failures                  │
//! │  └── ResolveError     - What the host sees for a failed lookup         │
//! │                                                                         │
//! │  Flow: InvalidBarcode → ResolveError → host                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An invalid barcode is a classification of the input, not a transient
//! condition. Nothing in this file is retryable.

use thiserror::Error;

// =============================================================================
// Invalid Barcode
// =============================================================================

/// Why a raw scan or manual entry could not be turned into a barcode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidBarcode {
    /// Input was empty or contained no digits at all.
    #[error("barcode is empty")]
    Empty,

    /// Digit count after stripping separators is not 8, 12 or 13.
    ///
    /// ## When This Occurs
    /// - Partial camera read (e.g. 7 digits)
    /// - Typo during manual entry
    /// - ITF-14 or other unsupported numeric codes
    #[error("barcode must have 8, 12 or 13 digits, got {digits}")]
    InvalidLength { digits: usize },

    /// The weighted digit sum is not a multiple of ten.
    #[error("barcode {code} has an invalid check digit")]
    InvalidChecksum { code: String },

    /// The capture collaborator tagged the code with a symbology that
    /// does not match its digit count (e.g. a 13-digit "UPC-E").
    #[error("{digits}-digit code cannot be {symbology}")]
    SymbologyMismatch { symbology: String, digits: usize },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for the smaller value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., locale tag with digits).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience alias for barcode validation results.
pub type BarcodeResult<T> = Result<T, InvalidBarcode>;

/// Convenience alias for value-type validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_barcode_messages() {
        let err = InvalidBarcode::InvalidLength { digits: 7 };
        assert_eq!(
            err.to_string(),
            "barcode must have 8, 12 or 13 digits, got 7"
        );

        let err = InvalidBarcode::InvalidChecksum {
            code: "4006381333932".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "barcode 4006381333932 has an invalid check digit"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::OutOfRange {
            field: "nova_group".to_string(),
            min: 1,
            max: 4,
        };
        assert_eq!(err.to_string(), "nova_group must be between 1 and 4");
    }
}
