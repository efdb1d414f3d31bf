//! Centralized path resolution for reqcache
//!
//! The response cache lives under the platform cache directory:
//! - **macOS**: `~/Library/Caches/<app_dir>/`
//! - **Windows**: `%LOCALAPPDATA%\<app_dir>\`
//! - **Linux**: `$XDG_CACHE_HOME/<app_dir>/` (fallback `~/.cache/<app_dir>/`)
//!
//! ```text
//! <cache root>/reqcache/
//! ├── Request/              (default app_dir, the cache store base)
//! │   ├── <group>/<fingerprint>.request
//! │   └── info/<group>/<fingerprint>.request
//! └── logs/
//!     └── reqcache_<date>.log
//! ```

use std::path::{Path, PathBuf};

const APP_NAME: &str = "reqcache";

/// Platform cache root, or None when the platform has no notion of one
/// and no home directory is known
fn resolve_cache_root() -> Option<PathBuf> {
  if let Some(dir) = dirs::cache_dir() {
    return Some(dir);
  }

  if let Some(dir) = dirs::data_local_dir() {
    return Some(dir);
  }

  dirs::home_dir().map(|home| home.join(".cache"))
}

/// Base directory of the response cache
///
/// `override_dir` (from `cache.base_dir`) is used verbatim; otherwise
/// `app_dir` is appended to the platform cache root.
pub fn get_cache_base_directory(app_dir: &str, override_dir: Option<&str>) -> Option<PathBuf> {
  if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
    return Some(PathBuf::from(dir));
  }
  resolve_cache_root().map(|root| root.join(app_dir))
}

/// Directory for daily log files
pub fn get_logs_directory() -> PathBuf {
  resolve_cache_root()
    .map(|root| root.join(APP_NAME))
    .unwrap_or_else(|| PathBuf::from(APP_NAME))
    .join("logs")
}

/// Default configuration file: `<config dir>/reqcache/config.toml`
pub fn get_config_path() -> PathBuf {
  dirs::config_dir()
    .map(|dir| dir.join(APP_NAME))
    .unwrap_or_else(|| PathBuf::from("."))
    .join("config.toml")
}

/// Reject relative cache paths that could escape the cache root
pub fn is_safe_relative(path: &str) -> bool {
  let candidate = Path::new(path);
  !path.is_empty() &&
    !candidate.is_absolute() &&
    candidate.components().all(|c| matches!(c, std::path::Component::Normal(_)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_override_wins() {
    let base = get_cache_base_directory("reqcache/Request", Some("/tmp/custom-cache"));
    assert_eq!(base, Some(PathBuf::from("/tmp/custom-cache")));
  }

  #[test]
  fn test_empty_override_ignored() {
    let with_empty = get_cache_base_directory("reqcache/Request", Some(""));
    let without = get_cache_base_directory("reqcache/Request", None);
    assert_eq!(with_empty, without);
  }

  #[test]
  fn test_app_dir_appended() {
    if let Some(base) = get_cache_base_directory("reqcache/Request", None) {
      assert!(base.ends_with("reqcache/Request"));
    }
  }

  #[test]
  fn test_logs_directory_named_logs() {
    assert!(get_logs_directory().ends_with("logs"));
    assert!(get_config_path().ends_with("config.toml"));
  }

  #[test]
  fn test_safe_relative() {
    assert!(is_safe_relative("Users/ABC.request"));
    assert!(is_safe_relative("ABC.request"));
    assert!(!is_safe_relative(""));
    assert!(!is_safe_relative("/etc/passwd"));
    assert!(!is_safe_relative("../outside.request"));
    assert!(!is_safe_relative("a/../../b"));
  }
}
