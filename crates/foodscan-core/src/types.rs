//! # Domain Types
//!
//! Core domain types used throughout FoodScan.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  HistoryRecord  │   │   NutriScore    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  barcode        │──►│  id (UUID)      │   │  A B C D E      │       │
//! │  │  name (locale)  │   │  barcode        │   └─────────────────┘       │
//! │  │  allergens      │   │  display fields │                             │
//! │  │  nova_group     │   │  is_favorite    │   ┌─────────────────┐       │
//! │  │  nutri_score    │   │  scanned_at     │   │   NovaGroup     │       │
//! │  │  nutriments     │   └─────────────────┘   │  ─────────────  │       │
//! │  └─────────────────┘                         │  1 2 3 4        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Product` is the display-ready record the pipeline builds once per
//! network fetch and caches verbatim. `HistoryRecord` is a denormalized
//! copy of the fields a history list needs, written once per resolution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

// =============================================================================
// Nutri-Score
// =============================================================================

/// Nutri-Score grade, A (best) to E (worst).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NutriScore {
    A,
    B,
    C,
    D,
    E,
}

impl NutriScore {
    /// Uppercase letter for badges.
    pub fn letter(&self) -> char {
        match self {
            NutriScore::A => 'A',
            NutriScore::B => 'B',
            NutriScore::C => 'C',
            NutriScore::D => 'D',
            NutriScore::E => 'E',
        }
    }
}

impl std::fmt::Display for NutriScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl std::str::FromStr for NutriScore {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(NutriScore::A),
            "b" => Ok(NutriScore::B),
            "c" => Ok(NutriScore::C),
            "d" => Ok(NutriScore::D),
            "e" => Ok(NutriScore::E),
            other => Err(ValidationError::InvalidFormat {
                field: "nutri_score".to_string(),
                reason: format!("'{}' is not a grade A-E", other),
            }),
        }
    }
}

// =============================================================================
// NOVA Group
// =============================================================================

/// NOVA food processing level, 1 (unprocessed) to 4 (ultra-processed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NovaGroup(u8);

impl NovaGroup {
    /// Creates a NOVA group, rejecting values outside 1-4.
    pub fn new(level: u8) -> ValidationResult<Self> {
        if !(1..=4).contains(&level) {
            return Err(ValidationError::OutOfRange {
                field: "nova_group".to_string(),
                min: 1,
                max: 4,
            });
        }
        Ok(NovaGroup(level))
    }

    /// The processing level.
    #[inline]
    pub const fn level(&self) -> u8 {
        self.0
    }

    /// True for group 4.
    #[inline]
    pub const fn is_ultra_processed(&self) -> bool {
        self.0 == 4
    }
}

// =============================================================================
// Product
// =============================================================================

/// A display-ready product record.
///
/// Localized fields already hold the text chosen by the locale fallback
/// chain for `locale`. Nutriments use an ordered map so two builds of the
/// same remote record serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Canonical 13-digit barcode.
    pub barcode: String,

    /// Product name.
    pub name: Option<String>,

    /// Generic name (e.g. "Semi-skimmed milk").
    pub generic_name: Option<String>,

    /// First listed brand.
    pub brand: Option<String>,

    /// Net quantity as printed ("1 L", "330 ml").
    pub quantity: Option<String>,

    /// Ingredients list.
    pub ingredients_text: Option<String>,

    /// Allergen tags without taxonomy prefix ("milk", "gluten").
    #[serde(default)]
    pub allergens: Vec<String>,

    /// "May contain" tags without taxonomy prefix.
    #[serde(default)]
    pub traces: Vec<String>,

    /// Category names.
    #[serde(default)]
    pub categories: Vec<String>,

    /// NOVA processing level.
    pub nova_group: Option<NovaGroup>,

    /// Nutri-Score grade.
    pub nutri_score: Option<NutriScore>,

    /// Nutrient values keyed by nutrient id ("energy-kcal_100g").
    #[serde(default)]
    pub nutriments: BTreeMap<String, f64>,

    /// Front image URL.
    pub image_url: Option<String>,

    /// Locale the localized fields were selected for.
    pub locale: String,
}

impl Product {
    /// Best title for a product card: name, generic name, brand, then the
    /// barcode itself.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.generic_name.as_deref())
            .or(self.brand.as_deref())
            .unwrap_or(&self.barcode)
    }

    /// True when the allergen list contains `tag` (case-insensitive).
    pub fn contains_allergen(&self, tag: &str) -> bool {
        self.allergens.iter().any(|a| a.eq_ignore_ascii_case(tag))
    }

    /// Looks up a nutrient value.
    pub fn nutriment(&self, key: &str) -> Option<f64> {
        self.nutriments.get(key).copied()
    }
}

// =============================================================================
// History Record
// =============================================================================

/// One entry of the scan history, denormalized for list display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HistoryRecord {
    /// Unique identifier (UUID v4), stable across re-scans.
    pub id: String,

    /// Canonical 13-digit barcode.
    pub barcode: String,

    /// Title shown in the list.
    pub name: String,

    /// Brand line.
    pub brand: Option<String>,

    /// Thumbnail URL.
    pub image_url: Option<String>,

    /// Nutri-Score badge.
    pub nutri_score: Option<NutriScore>,

    /// NOVA badge.
    pub nova_group: Option<NovaGroup>,

    /// Whether the user starred this product.
    pub is_favorite: bool,

    /// When the product was last scanned.
    #[ts(as = "String")]
    pub scanned_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Builds a fresh (non-favorite) record for a resolved product.
    pub fn from_product(product: &Product, scanned_at: DateTime<Utc>) -> Self {
        HistoryRecord {
            id: Uuid::new_v4().to_string(),
            barcode: product.barcode.clone(),
            name: product.display_name().to_string(),
            brand: product.brand.clone(),
            image_url: product.image_url.clone(),
            nutri_score: product.nutri_score,
            nova_group: product.nova_group,
            is_favorite: false,
            scanned_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
