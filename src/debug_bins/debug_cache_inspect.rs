use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use reqcache::cache::info::{is_within_ttl, CacheInfo, INFO_DIR};
use reqcache::config::{parse_config, Config};
use reqcache::paths;

#[derive(Parser)]
#[command(name = "debug_cache_inspect")]
#[command(about = "List cached responses with their age and expiry state", long_about = None)]
struct Args {
  /// Configuration file (defaults to the platform config directory)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Inspect this directory instead of the configured cache base
  #[arg(long)]
  base: Option<PathBuf>,

  /// Only show one group
  #[arg(short, long)]
  group: Option<String>,

  /// Print the first bytes of every payload
  #[arg(short, long)]
  verbose: bool,
}

struct Entry {
  group: String,
  name: String,
  info: Option<CacheInfo>,
  payload_size: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let args = Args::parse();

  let config_path = args.config.clone().unwrap_or_else(paths::get_config_path);
  let config = if config_path.exists() {
    parse_config(&fs::read_to_string(&config_path)?)?
  } else {
    Config::default()
  };

  let base = match args.base.clone() {
    Some(base) => base,
    None =>
      paths::get_cache_base_directory(&config.cache.app_dir, config.cache.base_dir.as_deref()).ok_or(
        "no cache directory on this platform"
      )?,
  };
  let ttl = Duration::from_secs(config.cache.expired_time_secs);

  println!("Cache inspector");
  println!("{}", "=".repeat(80));
  println!("Base:      {}", base.display());
  println!("Store TTL: {}s", ttl.as_secs());

  if !base.is_dir() {
    println!("\nCache directory does not exist yet");
    return Ok(());
  }

  let mut groups = list_dirs(&base)?
    .into_iter()
    .filter(|g| g != INFO_DIR)
    .filter(|g| args.group.as_deref().map(|only| only == g).unwrap_or(true))
    .collect::<Vec<_>>();
  groups.sort();

  let now = Utc::now();
  let (mut total, mut expired, mut orphaned) = (0usize, 0usize, 0usize);

  for group in &groups {
    let entries = collect_group(&base, group)?;
    println!("\n[{}] {} entries", group, entries.len());

    for entry in &entries {
      total += 1;
      let size = entry.payload_size.map(|s| format!("{} B", s)).unwrap_or_else(|| "missing".to_string());

      match &entry.info {
        Some(info) => {
          let age = now.signed_duration_since(info.created_at);
          let fresh = is_within_ttl(info.created_at, now, ttl);
          if !fresh {
            expired += 1;
          }
          println!(
            "  {}  {:>10}  age {:>8}s  {}",
            entry.name,
            size,
            age.num_seconds(),
            if fresh { "fresh" } else { "EXPIRED" }
          );
        }
        None => {
          orphaned += 1;
          println!("  {}  {:>10}  no metadata (never served)", entry.name, size);
        }
      }

      if args.verbose && entry.payload_size.is_some() {
        let bytes = fs::read(base.join(&entry.group).join(&entry.name))?;
        let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(120)]).replace('\n', " ");
        println!("      {}", preview);
      }
    }
  }

  println!("\n{}", "=".repeat(80));
  println!("{} entries, {} expired, {} without metadata", total, expired, orphaned);
  Ok(())
}

fn list_dirs(dir: &Path) -> std::io::Result<Vec<String>> {
  let mut names = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      names.push(entry.file_name().to_string_lossy().to_string());
    }
  }
  Ok(names)
}

/// Entries of one group, from both the payload directory and the metadata mirror
fn collect_group(base: &Path, group: &str) -> std::io::Result<Vec<Entry>> {
  let payload_dir = base.join(group);
  let info_dir = base.join(INFO_DIR).join(group);

  let mut names: Vec<String> = Vec::new();
  for dir in [&payload_dir, &info_dir] {
    if !dir.is_dir() {
      continue;
    }
    for entry in fs::read_dir(dir)? {
      let name = entry?.file_name().to_string_lossy().to_string();
      if !name.ends_with(".tmp") && !names.contains(&name) {
        names.push(name);
      }
    }
  }
  names.sort();

  Ok(
    names
      .into_iter()
      .map(|name| {
        let info = fs::read(info_dir.join(&name))
          .ok()
          .and_then(|bytes| serde_json::from_slice::<CacheInfo>(&bytes).ok());
        let payload_size = fs::metadata(payload_dir.join(&name)).ok().map(|m| m.len());
        Entry {
          group: group.to_string(),
          name,
          info,
          payload_size,
        }
      })
      .collect()
  )
}
