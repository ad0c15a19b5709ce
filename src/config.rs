//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;

use url::Url;

use crate::error::{CacheError, Result};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Redis connection URL; `None` selects the in-memory fallback
    pub redis_url: Option<String>,
    /// TTL in seconds applied by read-through handlers
    pub default_ttl: u64,
    /// Sweep interval in seconds for the in-memory fallback
    pub cleanup_interval: u64,
    /// Shared secret required by the sync and admin endpoints
    pub sync_secret: Option<String>,
    /// Requests allowed per client within one sync window
    pub sync_rate_limit_max: u64,
    /// Sync rate-limit window in seconds
    pub sync_rate_limit_window: u64,
    /// Deployment environment name (`development`, `production`, ...)
    pub app_env: String,
    /// Explicit switch for the cache metrics endpoint outside development
    pub cache_debug: bool,
    /// Document store connection string
    pub document_store_url: Option<String>,
    /// Resolved document store database name
    pub document_store_db: String,
    /// Connection pool size for the document store
    pub document_store_max_connections: u32,
    /// Currency used when a property row carries none
    pub default_currency: String,
    /// Public base URL prepended to relative image paths
    pub storage_public_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REDIS_URL` - Redis URL (default: unset, in-memory fallback)
    /// - `DEFAULT_TTL` - Read-through TTL in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Fallback sweep frequency in seconds (default: 30)
    /// - `SYNC_SECRET` - Shared secret for `/sync/property` and `/admin/*`
    /// - `SYNC_RATE_LIMIT_MAX` / `SYNC_RATE_LIMIT_WINDOW` (default: 30 per 60s)
    /// - `APP_ENV` - Deployment environment (default: development)
    /// - `CACHE_DEBUG` - Expose cache metrics outside development
    /// - `DOCUMENT_STORE_URL` / `DOCUMENT_STORE_DB` - Read-model store
    ///   (Postgres; unset keeps documents in process memory)
    /// - `DOCUMENT_STORE_MAX_CONNECTIONS` - Pool size (default: 5)
    /// - `DEFAULT_CURRENCY` - Fallback currency (default: USD)
    /// - `STORAGE_PUBLIC_URL` - Base URL for relative image paths
    ///
    /// Fails when a document store URL is set but its database name is
    /// missing or disagrees with `DOCUMENT_STORE_DB`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let document_store_url = non_empty_var("DOCUMENT_STORE_URL");
        let document_store_db = resolve_document_db(
            document_store_url.as_deref(),
            non_empty_var("DOCUMENT_STORE_DB").as_deref(),
        )?;

        Ok(Self {
            server_port: parsed_var("SERVER_PORT").unwrap_or(defaults.server_port),
            redis_url: non_empty_var("REDIS_URL"),
            default_ttl: parsed_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval: parsed_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            sync_secret: non_empty_var("SYNC_SECRET"),
            sync_rate_limit_max: parsed_var("SYNC_RATE_LIMIT_MAX")
                .unwrap_or(defaults.sync_rate_limit_max),
            sync_rate_limit_window: parsed_var("SYNC_RATE_LIMIT_WINDOW")
                .unwrap_or(defaults.sync_rate_limit_window),
            app_env: non_empty_var("APP_ENV").unwrap_or(defaults.app_env),
            cache_debug: non_empty_var("CACHE_DEBUG").is_some_and(|v| parse_flag(&v)),
            document_store_url,
            document_store_db: document_store_db.unwrap_or(defaults.document_store_db),
            document_store_max_connections: parsed_var("DOCUMENT_STORE_MAX_CONNECTIONS")
                .unwrap_or(defaults.document_store_max_connections),
            default_currency: non_empty_var("DEFAULT_CURRENCY")
                .unwrap_or(defaults.default_currency),
            storage_public_url: non_empty_var("STORAGE_PUBLIC_URL"),
        })
    }

    /// Whether `/debug/cache-metrics` should answer.
    pub fn metrics_endpoint_enabled(&self) -> bool {
        self.app_env == "development" || self.cache_debug
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            redis_url: None,
            default_ttl: 300,
            cleanup_interval: 30,
            sync_secret: None,
            sync_rate_limit_max: 30,
            sync_rate_limit_window: 60,
            app_env: "development".to_string(),
            cache_debug: false,
            document_store_url: None,
            document_store_db: "listings".to_string(),
            document_store_max_connections: 5,
            default_currency: "USD".to_string(),
            storage_public_url: None,
        }
    }
}

// == Helpers ==
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_var(name).and_then(|v| v.parse().ok())
}

/// `true`, `1`, `yes` and `on` (any case) enable a flag; anything else disables it.
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Picks the document store database name.
///
/// With a connection string present the name must come from exactly one
/// place, or from both places agreeing; anything else is an error.
fn resolve_document_db(url: Option<&str>, explicit: Option<&str>) -> Result<Option<String>> {
    let Some(url) = url else {
        return Ok(explicit.map(str::to_string));
    };

    let parsed = Url::parse(url)
        .map_err(|e| CacheError::Config(format!("DOCUMENT_STORE_URL is not a valid URL: {}", e)))?;
    let from_url = parsed
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string);

    match (from_url, explicit) {
        (None, None) => Err(CacheError::Config(
            "DOCUMENT_STORE_URL is set but no database name was given".to_string(),
        )),
        (Some(a), Some(b)) if a != b => Err(CacheError::Config(format!(
            "document store database is ambiguous: URL names '{}', DOCUMENT_STORE_DB names '{}'",
            a, b
        ))),
        (Some(a), _) => Ok(Some(a)),
        (None, Some(b)) => Ok(Some(b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_ttl, 300);
        assert!(config.redis_url.is_none());
        assert_eq!(config.document_store_db, "listings");
        assert!(config.metrics_endpoint_enabled());
    }

    #[test]
    fn test_metrics_endpoint_gated_outside_development() {
        let mut config = Config {
            app_env: "production".to_string(),
            ..Config::default()
        };
        assert!(!config.metrics_endpoint_enabled());

        config.cache_debug = true;
        assert!(config.metrics_endpoint_enabled());
    }

    #[test]
    fn test_parse_flag() {
        for on in ["true", "TRUE", "1", "yes", "on", " On "] {
            assert!(parse_flag(on), "{on} should enable");
        }
        for off in ["false", "0", "no", "off", "maybe"] {
            assert!(!parse_flag(off), "{off} should disable");
        }
    }

    #[test]
    fn test_document_db_without_url() {
        assert_eq!(resolve_document_db(None, None).unwrap(), None);
        assert_eq!(
            resolve_document_db(None, Some("props")).unwrap(),
            Some("props".to_string())
        );
    }

    #[test]
    fn test_document_db_from_url_path() {
        let db = resolve_document_db(Some("postgres://localhost:5432/realty"), None).unwrap();
        assert_eq!(db, Some("realty".to_string()));
    }

    #[test]
    fn test_document_db_missing_fails_fast() {
        let result = resolve_document_db(Some("postgres://localhost:5432"), None);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_document_db_conflict_fails_fast() {
        let result = resolve_document_db(Some("postgres://localhost:5432/realty"), Some("other"));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_document_db_agreeing_sources() {
        let db = resolve_document_db(Some("postgres://localhost:5432/realty"), Some("realty"));
        assert_eq!(db.unwrap(), Some("realty".to_string()));
    }
}
