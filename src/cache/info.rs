/// Cache entry location and metadata record
///
/// A relative cache path `group/name.request` maps to
/// `<base>/group/name.request` for the payload and
/// `<base>/info/group/name.request` for its metadata. A path without a
/// group segment lands in the `default` group.
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths::is_safe_relative;

pub const DEFAULT_GROUP: &str = "default";

/// Prefix of the metadata mirror; unusable as a group name
pub const INFO_DIR: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub group: String,
    /// Payload path relative to the store base
    pub payload: PathBuf,
    /// Metadata path relative to the store base
    pub info: PathBuf,
}

impl CacheLocation {
    /// None for paths that are empty, escape the base, or target the info mirror
    pub fn resolve(relative_path: &str) -> Option<Self> {
        if !is_safe_relative(relative_path) {
            return None;
        }

        let (group, payload) = match relative_path.split_once('/') {
            Some((group, _)) => (group.to_string(), PathBuf::from(relative_path)),
            None => (DEFAULT_GROUP.to_string(), PathBuf::from(DEFAULT_GROUP).join(relative_path)),
        };
        if group == INFO_DIR {
            return None;
        }

        let info = PathBuf::from(INFO_DIR).join(&payload);
        Some(Self { group, payload, info })
    }
}

/// Metadata persisted next to every payload, as a small JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub group: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl CacheInfo {
    pub fn new(location: &CacheLocation, created_at: DateTime<Utc>) -> Self {
        Self {
            group: location.group.clone(),
            file_path: location.payload.to_string_lossy().replace('\\', "/"),
            created_at,
        }
    }

    /// Age strictly greater than `ttl` is expired; exactly `ttl` old is still served
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !is_within_ttl(self.created_at, now, ttl)
    }
}

/// True while `now - created_at <= ttl`
///
/// Timestamps from the future (clock moved backwards) count as fresh.
pub fn is_within_ttl(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let age = now.signed_duration_since(created_at);
    match age.to_std() {
        Ok(age) => age <= ttl,
        Err(_) => true,
    }
}
