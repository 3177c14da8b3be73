//! # Locale Fallback
//!
//! Picks the best available localized text for a product field.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              select("pt", candidates) - first non-empty wins            │
//! │                                                                         │
//! │  1. candidates["pt"]          preferred locale                         │
//! │         │ empty/absent                                                  │
//! │         ▼                                                               │
//! │  2. candidates["en"]          skipped when preferred == "en"           │
//! │         │ empty/absent                                                  │
//! │         ▼                                                               │
//! │  3. default slot              the unsuffixed, original-language field  │
//! │         │ empty/absent                                                  │
//! │         ▼                                                               │
//! │  4. any other locale          insertion order                          │
//! │         │ nothing                                                       │
//! │         ▼                                                               │
//! │  None                                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whitespace-only values count as empty.
//!
//! ## Usage
//! ```rust
//! use foodscan_core::locale::{select, LocalizedCandidates};
//!
//! let name = LocalizedCandidates::new()
//!     .with_locale("pt", "")
//!     .with_locale("en", "Milk")
//!     .with_default("Leite");
//!
//! assert_eq!(select("pt", &name).as_deref(), Some("Milk"));
//! ```

use crate::error::{ValidationError, ValidationResult};

/// The locale every chain falls back to before the default slot.
pub const FALLBACK_LOCALE: &str = "en";

/// Name of the unlocalized slot when candidates are listed as pairs.
pub const DEFAULT_SLOT: &str = "default";

// =============================================================================
// Candidate Set
// =============================================================================

/// Ordered locale → text candidates for one field, plus the default slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedCandidates {
    default: Option<String>,
    localized: Vec<(String, Option<String>)>,
}

impl LocalizedCandidates {
    /// Creates an empty candidate set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `(locale, value)` pairs; the `"default"` key fills
    /// the default slot.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (locale, value) in pairs {
            let locale = locale.into();
            let value = value.map(Into::into);
            if locale == DEFAULT_SLOT {
                set.default = value;
            } else {
                set.insert(locale, value);
            }
        }
        set
    }

    /// Sets the default (unlocalized) value.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Adds a localized value.
    pub fn with_locale(mut self, locale: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(locale.into(), Some(value.into()));
        self
    }

    /// Adds or replaces a localized value, keeping the first insertion
    /// position of the locale.
    pub fn insert(&mut self, locale: String, value: Option<String>) {
        let locale = locale.to_ascii_lowercase();
        match self.localized.iter_mut().find(|(l, _)| *l == locale) {
            Some(slot) => slot.1 = value,
            None => self.localized.push((locale, value)),
        }
    }

    /// Sets the default slot in place.
    pub fn set_default(&mut self, value: Option<String>) {
        self.default = value;
    }

    /// The non-empty value for a locale, if any.
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.localized
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(locale))
            .and_then(|(_, v)| non_empty(v.as_deref()))
    }

    /// The non-empty default value, if any.
    pub fn default_value(&self) -> Option<&str> {
        non_empty(self.default.as_deref())
    }

    /// True when no candidate carries text.
    pub fn is_empty(&self) -> bool {
        self.default_value().is_none()
            && self.localized.iter().all(|(_, v)| non_empty(v.as_deref()).is_none())
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Returns the first non-empty candidate along the fallback chain.
///
/// Returns `None` only when every candidate is empty or absent.
pub fn select(preferred_locale: &str, candidates: &LocalizedCandidates) -> Option<String> {
    let preferred = preferred_locale.trim();

    if let Some(value) = candidates.get(preferred) {
        return Some(value.to_string());
    }

    if !preferred.eq_ignore_ascii_case(FALLBACK_LOCALE) {
        if let Some(value) = candidates.get(FALLBACK_LOCALE) {
            return Some(value.to_string());
        }
    }

    if let Some(value) = candidates.default_value() {
        return Some(value.to_string());
    }

    candidates
        .localized
        .iter()
        .filter(|(locale, _)| {
            !locale.eq_ignore_ascii_case(preferred) && !locale.eq_ignore_ascii_case(FALLBACK_LOCALE)
        })
        .find_map(|(_, value)| non_empty(value.as_deref()))
        .map(str::to_string)
}

/// Reduces a locale tag to the lowercase language code the product
/// database keys its fields by.
///
/// ## Example
/// ```rust
/// use foodscan_core::locale::language_code;
///
/// assert_eq!(language_code("pt-BR").unwrap(), "pt");
/// assert_eq!(language_code("en_US").unwrap(), "en");
/// assert!(language_code("").is_err());
/// ```
pub fn language_code(tag: &str) -> ValidationResult<String> {
    let language = tag
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if language.is_empty() {
        return Err(ValidationError::Required {
            field: "locale".to_string(),
        });
    }

    if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "locale".to_string(),
            reason: format!("'{}' is not a language code", tag),
        });
    }

    Ok(language)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
