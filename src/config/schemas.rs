/// Configuration schemas - every section defined once with its defaults
use serde::{Deserialize, Serialize};

use crate::config_struct;
use crate::errors::{NetworkError, NetworkResult};

/// Seven days, the per-request cache TTL default
pub const DEFAULT_CACHE_TIME_SECS: u64 = 7 * 24 * 60 * 60;

/// Fifteen days, the store-wide TTL default
pub const DEFAULT_EXPIRED_TIME_SECS: u64 = 15 * 24 * 60 * 60;

/// How request parameters are put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterEncoding {
    /// Query string for GET/HEAD/DELETE, form body otherwise
    #[default]
    Url,
    /// JSON object body
    Json,
}

// ============================================================================
// NETWORK CONFIGURATION
// ============================================================================

config_struct! {
    /// Transport session and URL resolution
    pub struct NetworkConfig {
        /// Full base URL, e.g. "https://api.example.com/v1"; wins over scheme + host
        base_url: String = String::new(),

        /// Used with `host` when `base_url` is empty
        scheme: String = "http".to_string(),
        host: String = String::new(),

        /// Changing this at runtime cancels every tracked request
        timeout_secs: f64 = 30.0,

        /// Changing this at runtime cancels every tracked request
        max_connections_per_host: usize = 10,

        parameter_encoding: ParameterEncoding = ParameterEncoding::Url,
    }
}

impl NetworkConfig {
    /// `base_url` when set, otherwise `scheme://host`
    pub fn resolved_base_url(&self) -> String {
        if !self.base_url.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}://{}", self.scheme, self.host)
        }
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Disk cache location and expiration
    pub struct CacheConfig {
        /// When false the store is built unavailable and every request goes to the network
        enabled: bool = true,

        /// Store-wide TTL applied on every disk read
        expired_time_secs: u64 = DEFAULT_EXPIRED_TIME_SECS,

        /// Per-request TTL for entities that don't set their own
        default_cache_time_secs: u64 = DEFAULT_CACHE_TIME_SECS,

        /// Subfolder appended to the platform cache directory
        app_dir: String = "reqcache/Request".to_string(),

        /// Absolute directory overriding the platform lookup
        base_dir: Option<String> = None,
    }
}

// ============================================================================
// LOGGING CONFIGURATION
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        min_level: String = "info".to_string(),
        debug_tags: Vec<String> = Vec::new(),
        file_logging: bool = false,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    pub struct Config {
        network: NetworkConfig = NetworkConfig::default(),
        cache: CacheConfig = CacheConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}

impl Config {
    pub fn validate(&self) -> NetworkResult<()> {
        let network = &self.network;

        if !network.base_url.is_empty() && !network.base_url.starts_with("http") {
            return Err(
                NetworkError::Config(format!("base_url must start with http: {}", network.base_url))
            );
        }
        if network.base_url.is_empty() && network.host.is_empty() {
            return Err(NetworkError::Config("either base_url or host must be set".to_string()));
        }
        if network.scheme != "http" && network.scheme != "https" {
            return Err(NetworkError::Config(format!("unsupported scheme: {}", network.scheme)));
        }
        if !(network.timeout_secs > 0.0) {
            return Err(NetworkError::Config("timeout_secs must be positive".to_string()));
        }
        if network.max_connections_per_host == 0 {
            return Err(
                NetworkError::Config("max_connections_per_host must be at least 1".to_string())
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_base(base_url: &str) -> Config {
        let mut config = Config::default();
        config.network.base_url = base_url.to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.default_cache_time_secs, 604_800);
        assert_eq!(config.cache.expired_time_secs, 1_296_000);
        assert_eq!(config.network.max_connections_per_host, 10);
        assert_eq!(config.network.parameter_encoding, ParameterEncoding::Url);
    }

    #[test]
    fn test_base_url_from_scheme_and_host() {
        let mut network = NetworkConfig::default();
        network.scheme = "https".to_string();
        network.host = "api.example.com".to_string();
        assert_eq!(network.resolved_base_url(), "https://api.example.com");

        network.base_url = "http://other.example.com".to_string();
        assert_eq!(network.resolved_base_url(), "http://other.example.com");
    }

    #[test]
    fn test_validate() {
        assert!(with_base("https://api.example.com").validate().is_ok());
        assert!(with_base("ftp://api.example.com").validate().is_err());
        assert!(Config::default().validate().is_err());

        let mut config = with_base("https://api.example.com");
        config.network.timeout_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = "[network]\nbase_url = \"https://x.test\"\nparameter_encoding = \"json\"\n";
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.network.base_url, "https://x.test");
        assert_eq!(config.network.parameter_encoding, ParameterEncoding::Json);
        assert_eq!(config.network.timeout_secs, 30.0);
        assert!(config.cache.enabled);
    }
}
