// ============================================================================
// Catalog Configuration
// ============================================================================
// Environment-driven settings. `CatalogConfig::load()` pulls in `.env`
// (dotenvy) and then reads the STARLIGHT_* variables.
// ============================================================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, DEFAULT_CACHE_TTL_MS, DEFAULT_MAX_CACHE_ENTRIES};
use crate::types::{CatalogError, CatalogResult};

pub const ENV_DB_PATH: &str = "STARLIGHT_DB_PATH";
pub const ENV_CATALOG_PATH: &str = "STARLIGHT_CATALOG_PATH";
pub const ENV_CACHE_TTL_MS: &str = "STARLIGHT_CACHE_TTL_MS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "STARLIGHT_CACHE_MAX_ENTRIES";
pub const ENV_SERVE_STALE: &str = "STARLIGHT_SERVE_STALE";
pub const ENV_COALESCE_FETCHES: &str = "STARLIGHT_COALESCE_FETCHES";

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Cache database file; None = default location
    pub db_path: Option<String>,
    /// JSON catalog export used as the upstream source
    pub catalog_path: Option<String>,
    pub cache_ttl_ms: i64,
    pub cache_max_entries: usize,
    pub serve_stale_on_error: bool,
    pub coalesce_fetches: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            catalog_path: None,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            cache_max_entries: DEFAULT_MAX_CACHE_ENTRIES,
            serve_stale_on_error: false,
            coalesce_fetches: false,
        }
    }
}

impl CatalogConfig {
    /// Load `.env` (if present) into the environment, then read settings
    pub fn load() -> CatalogResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Could not load .env file: {}", e),
        }
        Self::from_env()
    }

    /// Read settings from the process environment
    pub fn from_env() -> CatalogResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (env, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> CatalogResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_ttl_ms = match non_empty(ENV_CACHE_TTL_MS) {
            Some(raw) => parse_number::<i64>(ENV_CACHE_TTL_MS, &raw)?,
            None => defaults.cache_ttl_ms,
        };
        if cache_ttl_ms < 0 {
            return Err(CatalogError::Config(format!(
                "{} must not be negative (got {})",
                ENV_CACHE_TTL_MS, cache_ttl_ms
            )));
        }

        let cache_max_entries = match non_empty(ENV_CACHE_MAX_ENTRIES) {
            Some(raw) => parse_number::<usize>(ENV_CACHE_MAX_ENTRIES, &raw)?,
            None => defaults.cache_max_entries,
        };

        let serve_stale_on_error = match non_empty(ENV_SERVE_STALE) {
            Some(raw) => parse_flag(ENV_SERVE_STALE, &raw)?,
            None => defaults.serve_stale_on_error,
        };

        let coalesce_fetches = match non_empty(ENV_COALESCE_FETCHES) {
            Some(raw) => parse_flag(ENV_COALESCE_FETCHES, &raw)?,
            None => defaults.coalesce_fetches,
        };

        Ok(Self {
            db_path: non_empty(ENV_DB_PATH),
            catalog_path: non_empty(ENV_CATALOG_PATH),
            cache_ttl_ms,
            cache_max_entries,
            serve_stale_on_error,
            coalesce_fetches,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl_ms: self.cache_ttl_ms,
            max_entries: self.cache_max_entries,
            serve_stale_on_error: self.serve_stale_on_error,
            coalesce_fetches: self.coalesce_fetches,
        }
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> CatalogResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

fn parse_flag(key: &str, raw: &str) -> CatalogResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CatalogError::Config(format!(
            "{} must be a boolean (true/false), got '{}'",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> CatalogResult<CatalogConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CatalogConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.cache_config(), CacheConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_DB_PATH, "/tmp/cache.redb"),
            (ENV_CATALOG_PATH, "items.json"),
            (ENV_CACHE_TTL_MS, "60000"),
            (ENV_CACHE_MAX_ENTRIES, "3"),
            (ENV_SERVE_STALE, "yes"),
            (ENV_COALESCE_FETCHES, "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.db_path.as_deref(), Some("/tmp/cache.redb"));
        assert_eq!(config.catalog_path.as_deref(), Some("items.json"));

        let cache = config.cache_config();
        assert_eq!(cache.ttl_ms, 60_000);
        assert_eq!(cache.max_entries, 3);
        assert!(cache.serve_stale_on_error);
        assert!(cache.coalesce_fetches);
    }

    #[test]
    fn test_ttl_and_max_entries_are_independent() {
        let config = config_from(&[(ENV_CACHE_TTL_MS, "5")]).unwrap();
        assert_eq!(config.cache_ttl_ms, 5);
        assert_eq!(config.cache_max_entries, DEFAULT_MAX_CACHE_ENTRIES);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for vars in [
            [(ENV_CACHE_TTL_MS, "soon")],
            [(ENV_CACHE_TTL_MS, "-1")],
            [(ENV_CACHE_MAX_ENTRIES, "-3")],
            [(ENV_SERVE_STALE, "maybe")],
        ] {
            let err = config_from(&vars).unwrap_err();
            assert!(matches!(err, CatalogError::Config(_)), "Expected Config error for {:?}", vars);
        }
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[(ENV_DB_PATH, "  "), (ENV_CACHE_TTL_MS, "")]).unwrap();
        assert!(config.db_path.is_none());
        assert_eq!(config.cache_ttl_ms, DEFAULT_CACHE_TTL_MS);
    }
}
