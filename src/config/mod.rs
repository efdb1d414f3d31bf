//! Configuration system
//!
//! Structures are declared with `config_struct!` (see `macros.rs`) so every
//! field carries its default inline, and loaded from TOML by `utils.rs`.

pub mod macros;
mod schemas;
mod utils;

pub use schemas::{
    CacheConfig, Config, LoggingConfig, NetworkConfig, ParameterEncoding,
    DEFAULT_CACHE_TIME_SECS, DEFAULT_EXPIRED_TIME_SECS,
};
pub use utils::{load_config_from_path, parse_config};
