/// Runtime logger configuration
///
/// Populated from command-line flags (`--debug-<tag>`, `--verbose`,
/// `--verbose-<tag>`, `--quiet`) and from the `[logging]` config section.
/// Readers take a cheap clone; writers replace fields under the lock.
use std::collections::HashSet;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::config::LoggingConfig;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
    pub verbose_tags: HashSet<String>,
    /// Empty set means every tag is shown
    pub enabled_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn update_logger_config<F>(f: F) where F: FnOnce(&mut LoggerConfig) {
    f(&mut LOGGER_CONFIG.write());
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.min_level >= LogLevel::Debug || config.debug_tags.contains(&tag.to_debug_key())
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().verbose_tags.contains(&tag.to_debug_key())
}

/// Apply flags from the process arguments
pub fn init_from_args() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    update_logger_config(|config| apply_args(config, &args));
}

/// Apply the `[logging]` section of the loaded configuration
pub fn apply_settings(settings: &LoggingConfig) {
    update_logger_config(|config| {
        if let Some(level) = LogLevel::parse(&settings.min_level) {
            config.min_level = level;
        }
        for tag in &settings.debug_tags {
            config.debug_tags.insert(tag.to_lowercase());
        }
    });
}

fn apply_args(config: &mut LoggerConfig, args: &[String]) {
    for arg in args {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Warning;
        } else if let Some(tag) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(tag.to_lowercase());
        } else if let Some(tag) = arg.strip_prefix("--verbose-") {
            config.debug_tags.insert(tag.to_lowercase());
            config.verbose_tags.insert(tag.to_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_args_collects_tags() {
        let mut config = LoggerConfig::default();
        let args = vec![
            "--debug-cache".to_string(),
            "--verbose-registry".to_string(),
            "send".to_string(),
        ];
        apply_args(&mut config, &args);

        assert!(config.debug_tags.contains("cache"));
        assert!(config.debug_tags.contains("registry"));
        assert!(config.verbose_tags.contains("registry"));
        assert_eq!(config.min_level, LogLevel::Info);
    }

    #[test]
    fn test_quiet_and_verbose_set_level() {
        let mut config = LoggerConfig::default();
        apply_args(&mut config, &["--quiet".to_string()]);
        assert_eq!(config.min_level, LogLevel::Warning);
        apply_args(&mut config, &["--verbose".to_string()]);
        assert_eq!(config.min_level, LogLevel::Verbose);
    }
}
