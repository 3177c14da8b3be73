//! # Barcode Module
//!
//! Checksum validation and symbology normalization for retail barcodes.
//!
//! ## Normalization Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Raw Scan → NormalizedBarcode                        │
//! │                                                                         │
//! │  "4006381-333931"     "01234565" (UPC-E)     "96385074"                 │
//! │        │                     │                    │                     │
//! │        ▼                     ▼                    │                     │
//! │  strip non-digits      expand_upce()              │                     │
//! │        │               "012345000065"             │                     │
//! │        ▼                     │                    ▼                     │
//! │  checksum (13 rule)    checksum (12 rule)   checksum (8 rule)           │
//! │        │                     │                    │                     │
//! │        ▼                     ▼                    ▼                     │
//! │  "4006381333931"       "0012345000065"      "0000096385074"             │
//! │                                                                         │
//! │  Output is ALWAYS 13 digits (EAN-13 form) + the original symbology     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Checksum Weights
//! - 13 digits: even positions ×1, odd positions ×3 (check digit included)
//! - 12 digits: prefix a zero, then the 13-digit rule
//! - 8 digits: even positions ×3, odd positions ×1
//!
//! Left-padding an EAN-8 with five zeros shifts every digit by an odd
//! number of positions, so a valid EAN-8 is also a valid padded EAN-13.
//!
//! ## Usage
//! ```rust
//! use foodscan_core::barcode::{validate, Symbology};
//!
//! let barcode = validate("4006381333931").unwrap();
//! assert_eq!(barcode.code(), "4006381333931");
//! assert_eq!(barcode.symbology(), Symbology::Ean13);
//!
//! assert!(validate("4006381333932").is_err());
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{BarcodeResult, InvalidBarcode};

// =============================================================================
// Symbology
// =============================================================================

/// Barcode symbology as reported by the capture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    /// 13-digit European Article Number.
    Ean13,
    /// 8-digit European Article Number.
    Ean8,
    /// 12-digit Universal Product Code.
    UpcA,
    /// 8-digit zero-suppressed UPC, expands to UPC-A.
    UpcE,
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbology::Ean13 => write!(f, "EAN-13"),
            Symbology::Ean8 => write!(f, "EAN-8"),
            Symbology::UpcA => write!(f, "UPC-A"),
            Symbology::UpcE => write!(f, "UPC-E"),
        }
    }
}

impl std::str::FromStr for Symbology {
    type Err = crate::error::ValidationError;

    /// Accepts the spellings camera SDKs use: `EAN-13`, `ean13`,
    /// `org.gs1.EAN-13`, `upc_e`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('.').next().unwrap_or(s);
        let compact: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "ean13" => Ok(Symbology::Ean13),
            "ean8" => Ok(Symbology::Ean8),
            "upca" => Ok(Symbology::UpcA),
            "upce" => Ok(Symbology::UpcE),
            _ => Err(crate::error::ValidationError::InvalidFormat {
                field: "symbology".to_string(),
                reason: format!("unknown symbology '{}'", s),
            }),
        }
    }
}

// =============================================================================
// Normalized Barcode
// =============================================================================

/// A validated barcode in canonical 13-digit form.
///
/// Only produced by [`validate`] / [`validate_with_symbology`] (or by
/// deserializing a value that passes the same checks), so holding one
/// proves the checksum was verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBarcode")]
pub struct NormalizedBarcode {
    code: String,
    symbology: Symbology,
}

#[derive(Deserialize)]
struct RawBarcode {
    code: String,
    symbology: Symbology,
}

impl TryFrom<RawBarcode> for NormalizedBarcode {
    type Error = InvalidBarcode;

    fn try_from(raw: RawBarcode) -> Result<Self, Self::Error> {
        if raw.code.len() != 13 || !raw.code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidBarcode::InvalidLength {
                digits: raw.code.len(),
            });
        }
        if !checksum_is_valid(&raw.code) {
            return Err(InvalidBarcode::InvalidChecksum { code: raw.code });
        }
        Ok(NormalizedBarcode {
            code: raw.code,
            symbology: raw.symbology,
        })
    }
}

impl NormalizedBarcode {
    /// The canonical 13-digit code.
    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The symbology the code was scanned or entered as.
    #[inline]
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Returns the 12-digit UPC-A form when the code has a leading zero.
    pub fn as_upc_a(&self) -> Option<&str> {
        self.code.strip_prefix('0')
    }
}

impl std::fmt::Display for NormalizedBarcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

impl AsRef<str> for NormalizedBarcode {
    fn as_ref(&self) -> &str {
        &self.code
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a raw scan or manual entry.
///
/// ## Rules
/// - Non-digit characters (spaces, hyphens) are stripped first
/// - 8 digits → EAN-8, 12 digits → UPC-A, 13 digits → EAN-13
/// - Any other length fails with [`InvalidBarcode::InvalidLength`]
/// - Checksum must be valid for the detected length
///
/// ## Example
/// ```rust
/// use foodscan_core::barcode::validate;
///
/// assert_eq!(validate("9638-5074").unwrap().code(), "0000096385074");
/// assert_eq!(validate("036000291452").unwrap().code(), "0036000291452");
/// assert!(validate("").is_err());
/// ```
pub fn validate(raw: &str) -> BarcodeResult<NormalizedBarcode> {
    validate_with_symbology(raw, None)
}

/// Validates a scan using the symbology reported by the camera.
///
/// ## Hint Handling
/// ```text
/// hint      digits  action
/// ────────  ──────  ──────────────────────────────────────────────
/// None      8/12/13 detect by length
/// UPC-E     8       expand to UPC-A, validate with the 12-digit rule
/// UPC-A     12      validate with the 12-digit rule
/// UPC-A     13      accepted when it starts with 0 (EAN-13 wrapped)
/// EAN-8     8       validate with the 8-digit rule
/// EAN-13    13      validate with the 13-digit rule
/// other combinations → SymbologyMismatch
/// ```
pub fn validate_with_symbology(
    raw: &str,
    hint: Option<Symbology>,
) -> BarcodeResult<NormalizedBarcode> {
    let digits = strip_non_digits(raw);

    if digits.is_empty() {
        return Err(InvalidBarcode::Empty);
    }

    let symbology = match hint {
        None => match digits.len() {
            8 => Symbology::Ean8,
            12 => Symbology::UpcA,
            13 => Symbology::Ean13,
            n => return Err(InvalidBarcode::InvalidLength { digits: n }),
        },
        Some(hint) => {
            let compatible = match hint {
                Symbology::Ean13 => digits.len() == 13,
                Symbology::Ean8 | Symbology::UpcE => digits.len() == 8,
                Symbology::UpcA => {
                    digits.len() == 12 || (digits.len() == 13 && digits.starts_with('0'))
                }
            };
            if !compatible {
                if !matches!(digits.len(), 8 | 12 | 13) {
                    return Err(InvalidBarcode::InvalidLength {
                        digits: digits.len(),
                    });
                }
                return Err(InvalidBarcode::SymbologyMismatch {
                    symbology: hint.to_string(),
                    digits: digits.len(),
                });
            }
            hint
        }
    };

    // UPC-E carries the check digit of its UPC-A expansion
    let candidate = if symbology == Symbology::UpcE {
        expand_upce(&digits).ok_or(InvalidBarcode::InvalidLength {
            digits: digits.len(),
        })?
    } else {
        digits
    };

    if !checksum_is_valid(&candidate) {
        return Err(InvalidBarcode::InvalidChecksum { code: candidate });
    }

    Ok(NormalizedBarcode {
        code: normalize_to_ean13(&candidate),
        symbology,
    })
}

/// Returns true when the digit string carries a valid check digit.
///
/// Accepts 8, 12 or 13 ASCII digits; anything else is invalid.
pub fn checksum_is_valid(digits: &str) -> bool {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    match digits.len() {
        13 => weighted_sum(digits, 1, 3) % 10 == 0,
        12 => weighted_sum(&format!("0{}", digits), 1, 3) % 10 == 0,
        8 => weighted_sum(digits, 3, 1) % 10 == 0,
        _ => false,
    }
}

/// Computes the check digit for a payload of 7, 11 or 12 digits
/// (EAN-8, UPC-A and EAN-13 without their last digit).
///
/// ## Example
/// ```rust
/// use foodscan_core::barcode::check_digit;
///
/// assert_eq!(check_digit("400638133393"), Some(1));
/// assert_eq!(check_digit("9638507"), Some(4));
/// assert_eq!(check_digit("12"), None);
/// ```
pub fn check_digit(payload: &str) -> Option<u8> {
    if !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // The check digit always sits at weight 1 in the padded 13-digit form,
    // so pad the payload to 12 digits and weight from the left.
    let padded = match payload.len() {
        7 => format!("00000{}", payload),
        11 => format!("0{}", payload),
        12 => payload.to_string(),
        _ => return None,
    };

    let sum = weighted_sum(&padded, 1, 3);
    Some(((10 - sum % 10) % 10) as u8)
}

/// Expands an 8-digit UPC-E code into its 12-digit UPC-A form.
///
/// The last data digit (index 6) selects the expansion pattern:
///
/// ```text
/// UPC-E:  N d1 d2 d3 d4 d5 d6 C
///
/// d6 0-2  → N d1 d2 d6 0  0  0  0  d3 d4 d5 C
/// d6 3    → N d1 d2 d3 0  0  0  0  0  d4 d5 C
/// d6 4    → N d1 d2 d3 d4 0  0  0  0  0  d5 C
/// d6 5-9  → N d1 d2 d3 d4 d5 0  0  0  0  d6 C
/// ```
///
/// Returns `None` unless the input is exactly 8 ASCII digits. The check
/// digit is carried over unchanged; validate the result separately.
///
/// ## Example
/// ```rust
/// use foodscan_core::barcode::expand_upce;
///
/// assert_eq!(expand_upce("04252614").as_deref(), Some("042100005264"));
/// assert_eq!(expand_upce("0425261").as_deref(), None);
/// ```
pub fn expand_upce(code: &str) -> Option<String> {
    if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let d = code.as_bytes();
    let number_system = d[0] as char;
    let check = d[7] as char;
    let data = &code[1..7];

    let body = match d[6] {
        b'0'..=b'2' => format!("{}{}0000{}", &data[0..2], &data[5..6], &data[2..5]),
        b'3' => format!("{}00000{}", &data[0..3], &data[3..5]),
        b'4' => format!("{}00000{}", &data[0..4], &data[4..5]),
        _ => format!("{}0000{}", &data[0..5], &data[5..6]),
    };

    Some(format!("{}{}{}", number_system, body, check))
}

/// Left-pads a validated code to 13 digits.
///
/// ## Rules
/// - 8 digits: five leading zeros
/// - 12 digits: one leading zero
/// - 13 digits: unchanged
/// - anything else: returned unchanged (callers validate first)
pub fn normalize_to_ean13(code: &str) -> String {
    match code.len() {
        8 => format!("00000{}", code),
        12 => format!("0{}", code),
        _ => code.to_string(),
    }
}

/// Keeps ASCII digits only.
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn weighted_sum(digits: &str, even_weight: u32, odd_weight: u32) -> u32 {
    digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit * even_weight
            } else {
                digit * odd_weight
            }
        })
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
