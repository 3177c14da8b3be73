//! # Open Food Facts Client
//!
//! The network-fetch collaborator of the pipeline.
//!
//! ## Request
//! ```text
//! GET {base}/api/v2/product/{ean13}.json?fields=code,product_name,...&lc=pt
//! User-Agent: FoodScan/0.1 (contact@foodscan.app)
//! ```
//!
//! ## Response Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transport timeout            → FetchError::Timeout                     │
//! │  connect / DNS failure        → FetchError::NetworkUnavailable          │
//! │  HTTP 404                     → FetchError::NotFound                    │
//! │  HTTP 429                     → FetchError::RateLimitExceeded           │
//! │  other non-2xx                → FetchError::ServerError(code)           │
//! │  2xx, body not JSON           → FetchError::DecodingFailed              │
//! │  2xx, JSON                    → Ok(body)  (status field checked by      │
//! │                                            record::build_product)       │
//! │  token cancelled at any point → FetchError::Cancelled                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use foodscan_core::NormalizedBarcode;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{FetchError, LookupError, LookupResult};
use crate::record::LOCALIZED_FIELDS;

/// Fetches raw product records from a remote database.
///
/// Implementations must return promptly with `FetchError::Cancelled` once
/// `cancel` fires.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    /// Fetches the remote response for a barcode, asking for text in
    /// `locale` where the remote supports it.
    async fn fetch_product(
        &self,
        barcode: &NormalizedBarcode,
        locale: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError>;
}

/// reqwest-backed Open Food Facts client.
#[derive(Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: Url,
    fields: Vec<String>,
}

impl OpenFoodFactsClient {
    /// Builds a client from API settings.
    pub fn new(settings: &ApiSettings) -> LookupResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;

        Ok(OpenFoodFactsClient {
            client,
            base_url,
            fields: settings.fields.clone(),
        })
    }

    async fn request(&self, barcode: &NormalizedBarcode, locale: &str) -> Result<Value, FetchError> {
        let url = product_url(&self.base_url, barcode.code(), locale, &self.fields);
        debug!(barcode = %barcode, url = %url, "Fetching product");

        let response = self.client.get(url).send().await.map_err(transport_error)?;

        if let Some(err) = classify_status(response.status()) {
            if err != FetchError::NotFound {
                warn!(barcode = %barcode, status = response.status().as_u16(), "Product request failed");
            }
            return Err(err);
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::DecodingFailed(e.to_string())
            }
        })
    }
}

impl std::fmt::Debug for OpenFoodFactsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFoodFactsClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProductFetcher for OpenFoodFactsClient {
    async fn fetch_product(
        &self,
        barcode: &NormalizedBarcode,
        locale: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.request(barcode, locale) => result,
        }
    }
}

// =============================================================================
// Pure Helpers
// =============================================================================

/// Builds the product endpoint URL.
///
/// The requested field list gets `<field>_<locale>` and `<field>_en` for
/// each localized text field, so the fallback chain has something to pick
/// from.
pub fn product_url(base: &Url, barcode: &str, locale: &str, fields: &[String]) -> Url {
    let mut url = base.clone();
    let path = format!(
        "{}/api/v2/product/{}.json",
        base.path().trim_end_matches('/'),
        barcode
    );
    url.set_path(&path);

    let mut requested: Vec<String> = fields.to_vec();
    for field in LOCALIZED_FIELDS {
        for lc in [locale, "en"] {
            let localized = format!("{}_{}", field, lc);
            if !requested.contains(&localized) {
                requested.push(localized);
            }
        }
    }

    url.query_pairs_mut()
        .clear()
        .append_pair("fields", &requested.join(","))
        .append_pair("lc", locale);
    url
}

/// Maps an HTTP status to a fetch error; `None` for success.
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimitExceeded,
        other => FetchError::ServerError(other.as_u16()),
    })
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        classify_status(status).unwrap_or(FetchError::ServerError(status.as_u16()))
    } else {
        debug!(error = %err, "Transport failure");
        FetchError::NetworkUnavailable
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Some(FetchError::NotFound));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FetchError::RateLimitExceeded)
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(FetchError::ServerError(503))
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FetchError::ServerError(403))
        );
    }

    #[test]
    fn test_product_url() {
        let base = Url::parse("https://world.openfoodfacts.org/").unwrap();
        let fields = vec!["code".to_string(), "product_name".to_string()];
        let url = product_url(&base, "3017620422003", "pt", &fields);

        assert_eq!(url.path(), "/api/v2/product/3017620422003.json");

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(query[1], ("lc".to_string(), "pt".to_string()));

        let requested: Vec<&str> = query[0].1.split(',').collect();
        assert_eq!(requested[0], "code");
        assert!(requested.contains(&"product_name_pt"));
        assert!(requested.contains(&"ingredients_text_en"));
        assert_eq!(
            requested.iter().filter(|f| **f == "product_name_en").count(),
            1
        );
    }

    #[test]
    fn test_product_url_keeps_base_path() {
        let base = Url::parse("http://localhost:9000/off").unwrap();
        let url = product_url(&base, "0036000291452", "en", &[]);
        assert_eq!(url.path(), "/off/api/v2/product/0036000291452.json");
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let settings = ApiSettings {
            // Unroutable; the token wins before any connect attempt matters
            base_url: "http://10.255.255.1".to_string(),
            ..ApiSettings::default()
        };
        let client = OpenFoodFactsClient::new(&settings).unwrap();
        let barcode = foodscan_core::barcode::validate("4006381333931").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.fetch_product(&barcode, "en", &cancel).await;
        assert_eq!(result, Err(FetchError::Cancelled));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let settings = ApiSettings {
            base_url: "mailto:someone@example.com".to_string(),
            ..ApiSettings::default()
        };
        assert!(OpenFoodFactsClient::new(&settings).is_err());
    }
}
