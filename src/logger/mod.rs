//! Structured, tag-based logging for reqcache
//!
//! ```rust
//! use reqcache::logger::{self, LogTag};
//!
//! logger::warning(LogTag::Cache, "cache write failed");
//! logger::debug(LogTag::Registry, "registered request"); // only with --debug-registry
//! ```
//!
//! Binaries call `logger::init` once at startup; library code can log at
//! any time and simply gets console output with the default filters.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

use std::path::Path;

pub use config::{
    apply_settings, get_logger_config, init_from_args, set_logger_config, update_logger_config,
    LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Parse debug flags from the command line and, when a directory is given,
/// start mirroring log lines to a daily file in it
pub fn init(log_dir: Option<&Path>) {
    config::init_from_args();

    if let Some(dir) = log_dir {
        if let Err(e) = file::init_file_logging(dir) {
            warning(
                LogTag::System,
                &format!("File logging disabled, cannot open {}: {}", dir.display(), e),
            );
        }
    }
}

/// Always shown
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Only shown with --debug-<tag>
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Only shown with --verbose or --verbose-<tag>
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes; call during shutdown
pub fn flush() {
    file::flush_file_logging();
}
