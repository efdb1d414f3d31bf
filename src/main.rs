use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc;

use reqcache::{
    cache::CacheStore,
    config::{parse_config, Config},
    logger::{self, LogLevel, LogTag},
    orchestrator::OrchestratorBuilder,
    paths,
    request::{Callbacks, Parameters, RequestEntity, Target},
};

/// Send HTTP requests through the caching orchestrator and manage the cache
#[derive(Parser, Debug)]
#[command(name = "reqcache", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logs for a tag (cache, registry, request, transport, ...);
    /// `--debug-<tag>` and `--verbose-<tag>` are accepted as well
    #[arg(long = "debug", global = true, value_name = "TAG")]
    debug_tags: Vec<String>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one request and print every delivered result
    Send {
        /// HTTP method (GET, POST, ...)
        method: String,

        /// Absolute URL, or a path joined with the configured base URL
        target: String,

        /// Request parameter; values that parse as JSON keep their type
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Skip cache lookups and writes
        #[arg(long)]
        no_cache: bool,
    },
    /// Remove one cache group
    Evict { group: String },
    /// Remove every cached response
    EvictAll,
}

/// Per-tag logger flags are read by the logger straight from the process
/// arguments; clap never sees them
fn is_logger_tag_flag(arg: &str) -> bool {
    ["--debug-", "--verbose-"]
        .iter()
        .any(|prefix| arg.strip_prefix(prefix).map_or(false, |tag| !tag.is_empty()))
}

fn cli_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .filter(|arg| !is_logger_tag_flag(arg))
        .collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_from(cli_args(std::env::args()));

    if let Err(e) = run(cli).await {
        logger::error(LogTag::System, &format!("{:#}", e));
        logger::flush();
        std::process::exit(1);
    }
    logger::flush();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    let config = read_config(&config_path)?;

    let log_dir = config.logging.file_logging.then(paths::get_logs_directory);
    logger::init(log_dir.as_deref());
    logger::apply_settings(&config.logging);
    logger::update_logger_config(|logging| {
        for tag in &cli.debug_tags {
            logging.debug_tags.insert(tag.to_lowercase());
        }
        if cli.verbose {
            logging.min_level = LogLevel::Verbose;
        } else if cli.quiet {
            logging.min_level = LogLevel::Warning;
        }
    });

    match cli.command {
        Command::Send { method, target, params, no_cache } => {
            send(config, &method, &target, &params, no_cache).await
        }
        Command::Evict { group } => {
            let store = open_store(&config)?;
            store.evict_group(&group);
            logger::info(LogTag::Cache, &format!("Evicted group '{}'", group));
            Ok(())
        }
        Command::EvictAll => {
            let store = open_store(&config)?;
            store.evict_all();
            logger::info(LogTag::Cache, "Evicted all cached responses");
            Ok(())
        }
    }
}

/// Missing file means defaults; validation happens once CLI overrides are in
fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config file {}", path.display()))
}

fn open_store(config: &Config) -> Result<CacheStore> {
    let store = CacheStore::from_config(&config.cache);
    if !store.is_available() {
        bail!("Cache directory is unavailable (is caching disabled in the config?)");
    }
    Ok(store)
}

fn parse_params(raw: &[String]) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter '{}' is not KEY=VALUE", pair))?;
        let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
        parameters.insert(key.to_string(), value);
    }
    Ok(parameters)
}

enum Delivery {
    Value(Option<String>, bool),
    Failed(String),
}

async fn send(mut config: Config, method: &str, target: &str, params: &[String], no_cache: bool) -> Result<()> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|_| anyhow!("Invalid HTTP method '{}'", method))?;
    let target = Target::parse(target);

    // An absolute target doesn't need a configured base URL
    if let Target::Url(url) = &target {
        if config.network.base_url.is_empty() && config.network.host.is_empty() {
            let parsed = url::Url::parse(url).with_context(|| format!("Invalid URL {}", url))?;
            config.network.base_url = parsed.origin().ascii_serialization();
        }
    }

    let cache_time = Duration::from_secs(config.cache.default_cache_time_secs);
    let orchestrator = OrchestratorBuilder::new(config).build().context("Failed to start orchestrator")?;

    let entity = RequestEntity::new(method, target)
        .with_parameters(parse_params(params)?)
        .with_cache_time(cache_time)
        .with_use_cache(!no_cache);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let on_failure = tx.clone();
    let callbacks = Callbacks::new()
        .on_success(move |value, from_cache| {
            let _ = tx.send(Delivery::Value(value.map(str::to_string), from_cache));
        })
        .on_failure(move |error| {
            let _ = on_failure.send(Delivery::Failed(error.to_string()));
        });

    let entity = orchestrator.send_entity(Arc::new(entity), callbacks);
    logger::debug(LogTag::Request, &format!("{:?}", entity));

    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Value(value, true) => {
                println!("[cache] {}", value.unwrap_or_default());
            }
            Delivery::Value(value, false) => {
                println!("{}", value.unwrap_or_default());
                // The response is written in the background; don't exit under it
                orchestrator.store().flush();
                return Ok(());
            }
            Delivery::Failed(message) => bail!("Request failed: {}", message),
        }
    }

    bail!("Request ended without a result")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_tag_flags_are_left_to_the_logger() {
        let raw = args(&["reqcache", "--debug-cache", "--verbose-registry", "--debug", "request", "evict-all"]);
        assert!(Cli::try_parse_from(raw.clone()).is_err());

        let cli = Cli::try_parse_from(cli_args(raw)).unwrap();
        assert_eq!(cli.debug_tags, vec!["request".to_string()]);
        assert!(matches!(cli.command, Command::EvictAll));
    }

    #[test]
    fn test_plain_flags_still_reach_clap() {
        let cli = Cli::try_parse_from(cli_args(args(&["reqcache", "--verbose", "evict", "Users"]))).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Evict { ref group } if group == "Users"));

        // A bare prefix is not a tag flag
        assert!(Cli::try_parse_from(cli_args(args(&["reqcache", "--debug-", "evict-all"]))).is_err());
    }
}
