//! # Remote Record Builder
//!
//! Turns an Open Food Facts product response into a display-ready
//! [`Product`].
//!
//! ## Field Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  remote field                         Product field                     │
//! │  ─────────────────────────────────    ───────────────────────────────   │
//! │  product_name[_<lc>]            ──►   name               (locale chain) │
//! │  generic_name[_<lc>]            ──►   generic_name       (locale chain) │
//! │  ingredients_text[_<lc>]        ──►   ingredients_text   (locale chain) │
//! │  brands "A, B"                  ──►   brand = "A"                       │
//! │  quantity                       ──►   quantity                          │
//! │  image_front_url | image_url    ──►   image_url                         │
//! │  categories "A, B"              ──►   categories = ["A", "B"]           │
//! │  allergens_tags ["en:milk"]     ──►   allergens = ["milk"]              │
//! │  traces_tags                    ──►   traces                            │
//! │  nova_group 1-4                 ──►   nova_group                        │
//! │  nutriscore_grade "a"-"e"       ──►   nutri_score                       │
//! │  nutriments {k: number}         ──►   nutriments (numbers only)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use foodscan_core::locale::{language_code, select, LocalizedCandidates, FALLBACK_LOCALE};
use foodscan_core::{NormalizedBarcode, NovaGroup, NutriScore, Product};
use serde_json::{Map, Value};

use crate::error::FetchError;

/// Text fields resolved through the locale fallback chain.
pub const LOCALIZED_FIELDS: [&str; 3] = ["product_name", "generic_name", "ingredients_text"];

/// Builds a product from a full API response (`{"status": 1, "product": {..}}`).
///
/// ## Errors
/// - `status` present and not 1 → `FetchError::NotFound`
/// - `status` missing, or `product` missing or not an object →
///   `FetchError::DecodingFailed`
pub fn build_product(
    barcode: &NormalizedBarcode,
    response: &Value,
    preferred_locale: &str,
) -> Result<Product, FetchError> {
    let status = response
        .get("status")
        .and_then(as_integer)
        .ok_or_else(|| FetchError::DecodingFailed("missing numeric status".into()))?;

    if status != 1 {
        return Err(FetchError::NotFound);
    }

    let product = response
        .get("product")
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::DecodingFailed("product is not an object".into()))?;

    let locale =
        language_code(preferred_locale).unwrap_or_else(|_| FALLBACK_LOCALE.to_string());

    Ok(Product {
        barcode: barcode.code().to_string(),
        name: localized(product, "product_name", &locale),
        generic_name: localized(product, "generic_name", &locale),
        brand: text(product, "brands").and_then(|b| split_list(&b).into_iter().next()),
        quantity: text(product, "quantity"),
        ingredients_text: localized(product, "ingredients_text", &locale),
        allergens: tags(product, "allergens_tags"),
        traces: tags(product, "traces_tags"),
        categories: text(product, "categories")
            .map(|c| split_list(&c))
            .unwrap_or_default(),
        nova_group: product
            .get("nova_group")
            .and_then(as_integer)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| NovaGroup::new(n).ok()),
        nutri_score: text(product, "nutriscore_grade").and_then(|g| g.parse::<NutriScore>().ok()),
        nutriments: nutriments(product),
        image_url: text(product, "image_front_url").or_else(|| text(product, "image_url")),
        locale,
    })
}

/// Collects `<field>` and every `<field>_<lc>` into a candidate set.
pub fn candidates(product: &Map<String, Value>, field: &str) -> LocalizedCandidates {
    let mut set = LocalizedCandidates::new();
    set.set_default(product.get(field).and_then(Value::as_str).map(str::to_string));

    let prefix = format!("{}_", field);
    for (key, value) in product {
        let Some(suffix) = key.strip_prefix(&prefix) else {
            continue;
        };
        if is_language_suffix(suffix) {
            set.insert(suffix.to_string(), value.as_str().map(str::to_string));
        }
    }
    set
}

fn localized(product: &Map<String, Value>, field: &str, locale: &str) -> Option<String> {
    select(locale, &candidates(product, field)).map(|s| s.trim().to_string())
}

/// "en", "pt", "fil"; rejects suffixes such as "with_allergens".
fn is_language_suffix(suffix: &str) -> bool {
    (2..=3).contains(&suffix.len()) && suffix.chars().all(|c| c.is_ascii_lowercase())
}

fn text(product: &Map<String, Value>, field: &str) -> Option<String> {
    product
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Taxonomy tags with the language prefix dropped ("en:milk" → "milk").
fn tags(product: &Map<String, Value>, field: &str) -> Vec<String> {
    product
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|tag| tag.split_once(':').map_or(tag, |(_, name)| name))
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn nutriments(product: &Map<String, Value>) -> BTreeMap<String, f64> {
    product
        .get("nutriments")
        .and_then(Value::as_object)
        .map(|values| {
            values
                .iter()
                .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts `1`, `1.0` and `"1"`; the API is not consistent.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use foodscan_core::barcode::validate;
    use serde_json::json;

    fn nutella() -> Value {
        json!({
            "status": 1,
            "code": "3017620422003",
            "product": {
                "product_name": "Nutella",
                "product_name_fr": "Nutella pâte à tartiner",
                "product_name_pt": "",
                "generic_name_en": "Hazelnut spread",
                "ingredients_text": "Sucre, huile de palme",
                "ingredients_text_en": "Sugar, palm oil",
                "ingredients_text_with_allergens": "<b>ignored</b>",
                "brands": "Ferrero, Nutella",
                "quantity": "400 g",
                "image_front_url": "https://images.example/front.jpg",
                "image_url": "https://images.example/main.jpg",
                "categories": "Spreads, Sweet spreads, ",
                "allergens_tags": ["en:milk", "en:nuts"],
                "traces_tags": ["en:gluten"],
                "nova_group": 4,
                "nutriscore_grade": "e",
                "nutriments": {
                    "energy-kcal_100g": 539,
                    "sugars_100g": 56.3,
                    "energy-kcal_unit": "kcal"
                }
            }
        })
    }

    #[test]
    fn test_full_mapping() {
        let barcode = validate("3017620422003").unwrap();
        let product = build_product(&barcode, &nutella(), "pt").unwrap();

        // pt is empty, so English wins; no English name, so default
        assert_eq!(product.name.as_deref(), Some("Nutella"));
        assert_eq!(product.generic_name.as_deref(), Some("Hazelnut spread"));
        assert_eq!(product.ingredients_text.as_deref(), Some("Sugar, palm oil"));
        assert_eq!(product.brand.as_deref(), Some("Ferrero"));
        assert_eq!(product.quantity.as_deref(), Some("400 g"));
        assert_eq!(product.image_url.as_deref(), Some("https://images.example/front.jpg"));
        assert_eq!(product.categories, vec!["Spreads", "Sweet spreads"]);
        assert_eq!(product.allergens, vec!["milk", "nuts"]);
        assert_eq!(product.traces, vec!["gluten"]);
        assert_eq!(product.nova_group.map(|n| n.level()), Some(4));
        assert_eq!(product.nutri_score, Some(NutriScore::E));
        assert_eq!(product.nutriment("energy-kcal_100g"), Some(539.0));
        assert_eq!(product.nutriment("energy-kcal_unit"), None);
        assert_eq!(product.locale, "pt");
        assert_eq!(product.barcode, "3017620422003");
    }

    #[test]
    fn test_preferred_locale_wins() {
        let barcode = validate("3017620422003").unwrap();
        let product = build_product(&barcode, &nutella(), "fr-FR").unwrap();
        assert_eq!(product.name.as_deref(), Some("Nutella pâte à tartiner"));
        assert_eq!(product.locale, "fr");
    }

    #[test]
    fn test_status_not_found() {
        let barcode = validate("4006381333931").unwrap();
        let response = json!({"status": 0, "status_verbose": "product not found"});
        assert_eq!(
            build_product(&barcode, &response, "en"),
            Err(FetchError::NotFound)
        );
    }

    #[test]
    fn test_shape_errors() {
        let barcode = validate("4006381333931").unwrap();

        let no_product = json!({"status": 1});
        assert!(matches!(
            build_product(&barcode, &no_product, "en"),
            Err(FetchError::DecodingFailed(_))
        ));

        let bad_product = json!({"status": 1, "product": ["not", "an", "object"]});
        assert!(matches!(
            build_product(&barcode, &bad_product, "en"),
            Err(FetchError::DecodingFailed(_))
        ));

        let no_status = json!({"product": {}});
        assert!(matches!(
            build_product(&barcode, &no_status, "en"),
            Err(FetchError::DecodingFailed(_))
        ));
    }

    #[test]
    fn test_sparse_product_and_odd_values() {
        let barcode = validate("4006381333931").unwrap();
        let response = json!({
            "status": "1",
            "product": {
                "nova_group": "7",
                "nutriscore_grade": "unknown",
                "image_url": "https://images.example/main.jpg"
            }
        });

        let product = build_product(&barcode, &response, "en").unwrap();
        assert_eq!(product.name, None);
        assert_eq!(product.nova_group, None);
        assert_eq!(product.nutri_score, None);
        assert_eq!(product.image_url.as_deref(), Some("https://images.example/main.jpg"));
        assert!(product.allergens.is_empty());
        assert!(product.nutriments.is_empty());
    }

    #[test]
    fn test_same_response_builds_identical_bytes() {
        let barcode = validate("3017620422003").unwrap();
        let a = serde_json::to_vec(&build_product(&barcode, &nutella(), "en").unwrap()).unwrap();
        let b = serde_json::to_vec(&build_product(&barcode, &nutella(), "en").unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
