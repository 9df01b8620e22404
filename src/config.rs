//! Runtime configuration and defaults

use std::path::PathBuf;
use std::time::Duration;

/// Scryfall REST API base URL
pub const SCRYFALL_API_BASE: &str = "https://api.scryfall.com";

/// Scryfall asks clients to wait 50-100ms between requests
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Per-request timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Scryfall refreshes card prices once a day
pub const DEFAULT_CACHE_EXPIRY_HOURS: u32 = 24;

/// Settings shared by the client, the store and the service
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub database_path: PathBuf,
    pub cache_expiry: chrono::Duration,
    pub min_request_interval: Duration,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: SCRYFALL_API_BASE.to_string(),
            database_path: default_db_path(),
            cache_expiry: chrono::Duration::hours(i64::from(DEFAULT_CACHE_EXPIRY_HOURS)),
            min_request_interval: MIN_REQUEST_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Returns the default database path: ~/.local/share/sf_price_fetcher/lookups.db
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sf_price_fetcher")
        .join("lookups.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scryfall_guidelines() {
        let config = Config::default();
        assert_eq!(config.api_base, "https://api.scryfall.com");
        assert_eq!(config.min_request_interval, Duration::from_millis(100));
        assert_eq!(config.cache_expiry, chrono::Duration::hours(24));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn default_db_path_ends_with_app_dir() {
        let path = default_db_path();
        assert!(path.ends_with("sf_price_fetcher/lookups.db"));
    }
}
