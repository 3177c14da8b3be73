//! # Lookup Configuration
//!
//! Configuration management for the lookup engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FOODSCAN_API_URL=https://world.openfoodfacts.net                   │
//! │     FOODSCAN_LOCALE=pt                                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/foodscan/foodscan.toml (Linux)                           │
//! │     ~/Library/Application Support/app.foodscan.foodscan/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     100 lookups / 60 s, 7 day TTL, 1.5 s cooldown, "en"                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # foodscan.toml
//! [api]
//! base_url = "https://world.openfoodfacts.org"
//! user_agent = "FoodScan/0.1 (contact@foodscan.app)"
//! timeout_secs = 15
//!
//! [rate_limit]
//! capacity = 100
//! window_secs = 60
//!
//! [cache]
//! ttl_days = 7
//! evict_after_days = 30
//!
//! [pipeline]
//! cooldown_ms = 1500
//! preferred_locale = "en"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use foodscan_core::locale::language_code;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{LookupError, LookupResult};

// =============================================================================
// API Settings
// =============================================================================

/// Remote product database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the Open Food Facts instance.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `User-Agent` header. Open Food Facts asks every client
    /// to identify itself with an app name and contact.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Fields requested from the product endpoint. Localized variants of
    /// the text fields are added per request.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
}

fn default_base_url() -> String {
    "https://world.openfoodfacts.org".to_string()
}

fn default_user_agent() -> String {
    format!("FoodScan/{} (contact@foodscan.app)", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    15
}

fn default_fields() -> Vec<String> {
    [
        "code",
        "product_name",
        "generic_name",
        "ingredients_text",
        "brands",
        "quantity",
        "image_front_url",
        "image_url",
        "categories",
        "allergens_tags",
        "traces_tags",
        "nova_group",
        "nutriscore_grade",
        "nutriments",
        "lang",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            fields: default_fields(),
        }
    }
}

// =============================================================================
// Rate Limit Settings
// =============================================================================

/// Token bucket guarding outbound lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum tokens (lookups) per window.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Window length (seconds).
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_capacity() -> u32 {
    100
}

fn default_window() -> u64 {
    60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            capacity: default_capacity(),
            window_secs: default_window(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Product cache lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entries this old are never served.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,

    /// Age threshold used by maintenance sweeps.
    #[serde(default = "default_evict_after")]
    pub evict_after_days: u32,
}

fn default_ttl_days() -> u32 {
    7
}

fn default_evict_after() -> u32 {
    30
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_days: default_ttl_days(),
            evict_after_days: default_evict_after(),
        }
    }
}

// =============================================================================
// Pipeline Settings
// =============================================================================

/// Resolution pipeline behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Window after a completed resolution in which a repeat scan of the
    /// same barcode reuses the result (milliseconds).
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,

    /// Locale the host prefers for product text.
    #[serde(default = "default_locale")]
    pub preferred_locale: String,
}

fn default_cooldown() -> u64 {
    1500
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            cooldown_ms: default_cooldown(),
            preferred_locale: default_locale(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the SQLite store lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Lookup Configuration
// =============================================================================

/// Complete lookup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl LookupConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (foodscan.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LookupResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading lookup config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load lookup config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LookupResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LookupError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LookupError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| LookupError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Lookup config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LookupResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LookupError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.user_agent.trim().is_empty() {
            return Err(LookupError::InvalidConfig(
                "user_agent must not be empty".into(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(LookupError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.rate_limit.capacity == 0 {
            return Err(LookupError::InvalidConfig(
                "capacity must be greater than 0".into(),
            ));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(LookupError::InvalidConfig(
                "window_secs must be greater than 0".into(),
            ));
        }

        if self.cache.ttl_days == 0 {
            return Err(LookupError::InvalidConfig(
                "ttl_days must be greater than 0".into(),
            ));
        }

        language_code(&self.pipeline.preferred_locale)?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FOODSCAN_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(agent) = std::env::var("FOODSCAN_USER_AGENT") {
            self.api.user_agent = agent;
        }

        if let Ok(locale) = std::env::var("FOODSCAN_LOCALE") {
            debug!(locale = %locale, "Overriding preferred locale from environment");
            self.pipeline.preferred_locale = locale;
        }

        if let Ok(capacity) = std::env::var("FOODSCAN_RATE_LIMIT") {
            match capacity.parse::<u32>() {
                Ok(c) => self.rate_limit.capacity = c,
                Err(_) => warn!(value = %capacity, "Ignoring non-numeric FOODSCAN_RATE_LIMIT"),
            }
        }

        if let Ok(window) = std::env::var("FOODSCAN_RATE_WINDOW_SECS") {
            if let Ok(w) = window.parse::<u64>() {
                self.rate_limit.window_secs = w;
            }
        }

        if let Ok(ttl) = std::env::var("FOODSCAN_CACHE_TTL_DAYS") {
            if let Ok(t) = ttl.parse::<u32>() {
                self.cache.ttl_days = t;
            }
        }

        if let Ok(cooldown) = std::env::var("FOODSCAN_COOLDOWN_MS") {
            if let Ok(c) = cooldown.parse::<u64>() {
                self.pipeline.cooldown_ms = c;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "foodscan", "foodscan")
            .map(|dirs| dirs.config_dir().join("foodscan.toml"))
    }

    /// Returns the database path: the configured one, or `foodscan.db` in
    /// the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("app", "foodscan", "foodscan")
                .map(|dirs| dirs.data_dir().join("foodscan.db"))
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        self.api.request_timeout()
    }

    /// Eviction age for a maintenance sweep: the requested days, or
    /// `cache.evict_after_days` when none were given.
    pub fn eviction_days(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.cache.evict_after_days)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cache.ttl_days))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.pipeline.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LookupConfig::default();
        assert_eq!(config.rate_limit.capacity, 100);
        assert_eq!(config.rate_window(), Duration::from_secs(60));
        assert_eq!(config.cache_ttl(), chrono::Duration::days(7));
        assert_eq!(config.cooldown(), Duration::from_millis(1500));
        assert_eq!(config.pipeline.preferred_locale, "en");
        assert!(config.api.user_agent.starts_with("FoodScan/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_and_eviction_follow_file() {
        let config: LookupConfig = toml::from_str(
            r#"
            [api]
            timeout_secs = 4

            [cache]
            evict_after_days = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.request_timeout(), Duration::from_secs(4));
        assert_eq!(config.api.request_timeout(), Duration::from_secs(4));
        assert_eq!(config.eviction_days(None), 90);
        assert_eq!(config.eviction_days(Some(14)), 14);
        assert_eq!(LookupConfig::default().eviction_days(None), 30);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LookupConfig::default();

        config.api.base_url = "ftp://openfoodfacts.org".to_string();
        assert!(matches!(config.validate(), Err(LookupError::InvalidUrl(_))));

        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "http://localhost:8080".to_string();
        assert!(config.validate().is_ok());

        config.rate_limit.capacity = 0;
        assert!(config.validate().unwrap_err().is_config_error());
        config.rate_limit.capacity = 10;

        config.pipeline.preferred_locale = "portuguese".to_string();
        assert!(config.validate().is_err());
        config.pipeline.preferred_locale = "pt-BR".to_string();
        assert!(config.validate().is_ok());

        config.api.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LookupConfig = toml::from_str(
            r#"
            [rate_limit]
            capacity = 10

            [pipeline]
            preferred_locale = "fr"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.pipeline.preferred_locale, "fr");
        assert_eq!(config.pipeline.cooldown_ms, 1500);
        assert_eq!(config.api.base_url, "https://world.openfoodfacts.org");
    }

    #[test]
    fn test_toml_serialization() {
        let config = LookupConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[pipeline]"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("foodscan-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("foodscan.toml");

        let mut config = LookupConfig::default();
        config.cache.ttl_days = 3;
        config.storage.database_path = Some(dir.join("db.sqlite"));
        config.save(Some(path.clone())).unwrap();

        let loaded = LookupConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.cache.ttl_days, 3);
        assert_eq!(loaded.database_path(), Some(dir.join("db.sqlite")));

        std::fs::remove_dir_all(dir).ok();
    }
}
