/// Core logging implementation with automatic filtering
use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug requires debug mode for that tag (or a Debug/Verbose threshold)
/// 3. Verbose requires --verbose or --verbose-<tag>
/// 4. Everything else is checked against the minimum level
/// 5. A non-empty enabled set restricts which tags are shown
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();

    let level_ok = match level {
        LogLevel::Debug => is_debug_enabled_for_tag(tag),
        LogLevel::Verbose =>
            config.min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(tag),
        _ => level <= config.min_level,
    };
    if !level_ok {
        return false;
    }

    config.enabled_tags.is_empty() || config.enabled_tags.contains(&tag.to_debug_key())
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    super::format::format_and_log(&tag, level, message);
}
