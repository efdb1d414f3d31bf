/// Configuration loading
///
/// There is no process-wide config instance: callers load a `Config`, hand
/// it to `OrchestratorBuilder::new`, and keep it wherever their application keeps
/// startup state.
use std::path::Path;

use super::schemas::Config;
use crate::errors::{NetworkError, NetworkResult};
use crate::logger::{self, LogTag};

/// Load configuration from a TOML file
///
/// A missing file yields the defaults; an unreadable or malformed file is an
/// error. The result is validated before it is returned.
pub fn load_config_from_path(path: &Path) -> NetworkResult<Config> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        parse_config(&contents).map_err(|e| match e {
            NetworkError::Config(msg) =>
                NetworkError::Config(format!("'{}': {}", path.display(), msg)),
            other => other,
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Parse a TOML document without validating it
pub fn parse_config(contents: &str) -> NetworkResult<Config> {
    toml::from_str::<Config>(contents).map_err(|e| NetworkError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults_and_fails_validation() {
        // Defaults have neither base_url nor host
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(NetworkError::Config(_))));
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqcache.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[network]\nhost = \"api.example.com\"\nscheme = \"https\"").unwrap();
        writeln!(file, "[cache]\nexpired_time_secs = 60").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.network.resolved_base_url(), "https://api.example.com");
        assert_eq!(config.cache.expired_time_secs, 60);
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[network\nhost = 1").unwrap();

        match load_config_from_path(&path) {
            Err(NetworkError::Config(msg)) => assert!(msg.contains("broken.toml")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
