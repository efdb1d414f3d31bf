/// Disk-backed response store
///
/// Reads go through a dedicated reader worker and block the caller; writes
/// go through a dedicated writer worker and return immediately. Both workers
/// process jobs in order, so two writes to the same key land in submission
/// order. Every file is written to a temporary sibling and renamed into
/// place, so a concurrent read sees either the previous or the new content.
///
/// Writes still sitting in the writer queue are visible to reads through a
/// small pending map, so `put` followed by `get` returns the new bytes
/// without waiting for the disk.
///
/// A store whose base directory could not be created is *unavailable*:
/// reads miss, writes report failure, nothing panics.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::info::{is_within_ttl, CacheInfo, CacheLocation, INFO_DIR};
use super::worker::SerialWorker;
use crate::config::CacheConfig;
use crate::errors::{NetworkError, NetworkResult};
use crate::logger::{self, LogTag};
use crate::paths;

/// Completion report for a background write
pub type PutCallback = Box<dyn FnOnce(NetworkResult<()>) + Send + 'static>;

/// Payload plus the creation time from its metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

struct Workers {
    reader: SerialWorker,
    writer: SerialWorker,
}

/// Queued write, keyed by payload path; `seq` tells a finishing job whether
/// a newer write has replaced it in the meantime
struct PendingWrite {
    seq: u64,
    bytes: Arc<Vec<u8>>,
    created_at: DateTime<Utc>,
}

type PendingWrites = Arc<Mutex<HashMap<PathBuf, PendingWrite>>>;

pub struct CacheStore {
    base: Option<Arc<PathBuf>>,
    expired_time: Duration,
    workers: Option<Workers>,
    pending: PendingWrites,
    next_seq: AtomicU64,
}

impl CacheStore {
    /// Open a store rooted at `base`
    ///
    /// The directory is created when missing. A regular file already at that
    /// path is left in place and the store comes up unavailable, as it does
    /// for any other creation failure.
    pub fn open(base: Option<PathBuf>, expired_time: Duration) -> Self {
        let base = match base {
            Some(path) => path,
            None => {
                logger::warning(LogTag::Cache, "No cache directory for this platform, caching disabled");
                return Self::unavailable();
            }
        };

        if !ensure_directory(&base) {
            logger::warning(
                LogTag::Cache,
                &format!("Cannot create cache directory {}, caching disabled", base.display()),
            );
            return Self::unavailable();
        }

        let workers = match
            (SerialWorker::spawn("reqcache-cache-read"), SerialWorker::spawn("reqcache-cache-write"))
        {
            (Ok(reader), Ok(writer)) => Workers { reader, writer },
            (Err(e), _) | (_, Err(e)) => {
                logger::error(LogTag::Cache, &format!("Cannot start cache workers: {}", e));
                return Self::unavailable();
            }
        };

        logger::debug(LogTag::Cache, &format!("Cache store at {}", base.display()));

        Self {
            base: Some(Arc::new(base)),
            expired_time,
            workers: Some(workers),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::unavailable();
        }
        let base = paths::get_cache_base_directory(&config.app_dir, config.base_dir.as_deref());
        Self::open(base, Duration::from_secs(config.expired_time_secs))
    }

    pub fn unavailable() -> Self {
        Self {
            base: None,
            expired_time: Duration::ZERO,
            workers: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.base.is_some() && self.workers.is_some()
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base.as_deref().map(|p| p.as_path())
    }

    /// Store-wide TTL applied to every read
    pub fn expired_time(&self) -> Duration {
        self.expired_time
    }

    /// Payload bytes, or None on miss, expiry or unavailable store
    pub fn get(&self, relative_path: &str) -> Option<Vec<u8>> {
        self.get_entry(relative_path).map(|entry| entry.bytes)
    }

    /// UTF-8 payload; invalid UTF-8 is a miss
    pub fn get_string(&self, relative_path: &str) -> Option<String> {
        self.get(relative_path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn get_entry(&self, relative_path: &str) -> Option<CachedPayload> {
        self.get_entry_at(relative_path, Utc::now())
    }

    /// Lookup evaluated against an explicit clock
    pub fn get_entry_at(&self, relative_path: &str, now: DateTime<Utc>) -> Option<CachedPayload> {
        let (base, workers) = match (&self.base, &self.workers) {
            (Some(base), Some(workers)) => (base.clone(), workers),
            _ => return None,
        };
        let location = CacheLocation::resolve(relative_path)?;
        let ttl = self.expired_time;

        if let Some(pending) = self.pending.lock().get(&location.payload) {
            return if is_within_ttl(pending.created_at, now, ttl) {
                Some(CachedPayload {
                    bytes: pending.bytes.as_ref().clone(),
                    created_at: pending.created_at,
                })
            } else {
                None
            };
        }

        let result = workers.reader.run(move || read_entry(&base, &location, now, ttl))?;
        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                logger::debug(LogTag::Cache, &format!("Cache miss for {}: {}", relative_path, e));
                None
            }
        }
    }

    /// Persist `bytes` in the background; `on_done` gets Ok only when both the
    /// payload and its metadata were written
    pub fn put(&self, relative_path: &str, bytes: Vec<u8>, on_done: Option<PutCallback>) {
        self.put_at(relative_path, bytes, Utc::now(), on_done);
    }

    pub fn put_string(&self, relative_path: &str, value: &str, on_done: Option<PutCallback>) {
        self.put(relative_path, value.as_bytes().to_vec(), on_done);
    }

    pub(crate) fn put_at(
        &self,
        relative_path: &str,
        bytes: Vec<u8>,
        created_at: DateTime<Utc>,
        on_done: Option<PutCallback>
    ) {
        let report = |on_done: Option<PutCallback>, result: NetworkResult<()>| {
            if let Some(callback) = on_done {
                callback(result);
            }
        };

        let (base, workers) = match (&self.base, &self.workers) {
            (Some(base), Some(workers)) => (base.clone(), workers),
            _ => {
                return report(
                    on_done,
                    Err(NetworkError::CacheUnavailable("cache directory unavailable".to_string()))
                );
            }
        };
        let location = match CacheLocation::resolve(relative_path) {
            Some(location) => location,
            None => {
                return report(
                    on_done,
                    Err(NetworkError::Serialization(format!("invalid cache path: {}", relative_path)))
                );
            }
        };

        let bytes = Arc::new(bytes);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(location.payload.clone(), PendingWrite {
            seq,
            bytes: bytes.clone(),
            created_at,
        });

        let pending = self.pending.clone();
        let path_for_log = relative_path.to_string();
        let queued = workers.writer.submit(move || {
            let result = write_entry(&base, &location, &bytes, created_at);
            {
                let mut pending = pending.lock();
                if pending.get(&location.payload).map(|p| p.seq == seq).unwrap_or(false) {
                    pending.remove(&location.payload);
                }
            }
            if let Err(e) = &result {
                logger::warning(LogTag::Cache, &format!("Cache write failed for {}: {}", path_for_log, e));
            }
            if let Some(callback) = on_done {
                callback(result);
            }
        });
        if !queued {
            logger::error(LogTag::Cache, "Cache writer is gone, dropping write");
            self.pending.lock().retain(|_, p| p.seq != seq);
        }
    }

    /// Block until every write queued before this call has finished
    ///
    /// Must not be called from inside a `put` completion callback.
    pub fn flush(&self) {
        if let Some(workers) = &self.workers {
            let _ = workers.writer.run(|| ());
        }
    }

    /// Remove one group and its metadata mirror
    ///
    /// Runs on the writer queue, ordered after pending writes; the caller
    /// blocks until the files are gone. Missing directories are fine.
    pub fn evict_group(&self, group: &str) {
        if group.is_empty() || group == INFO_DIR || !paths::is_safe_relative(group) || group.contains('/') {
            logger::warning(LogTag::Cache, &format!("Refusing to evict group '{}'", group));
            return;
        }
        let (base, workers) = match (&self.base, &self.workers) {
            (Some(base), Some(workers)) => (base.clone(), workers),
            _ => return,
        };
        self.pending.lock().retain(|path, _| !path.starts_with(group));
        let group = group.to_string();
        let _ = workers.writer.run(move || {
            remove_tree(&base.join(&group));
            remove_tree(&base.join(INFO_DIR).join(&group));
        });
    }

    /// Remove every cached entry; the base directory is recreated empty
    pub fn evict_all(&self) {
        let (base, workers) = match (&self.base, &self.workers) {
            (Some(base), Some(workers)) => (base.clone(), workers),
            _ => return,
        };
        self.pending.lock().clear();
        let _ = workers.writer.run(move || {
            remove_tree(&base);
            ensure_directory(&base);
        });
    }
}

/// Make sure `path` is a directory, replacing nothing that isn't ours to remove
fn ensure_directory(path: &Path) -> bool {
    if path.is_dir() {
        return true;
    }
    fs::create_dir_all(path).is_ok() && path.is_dir()
}

fn remove_tree(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            logger::warning(LogTag::Cache, &format!("Failed to remove {}: {}", path.display(), e));
        }
    }
}

fn read_entry(
    base: &Path,
    location: &CacheLocation,
    now: DateTime<Utc>,
    ttl: Duration
) -> NetworkResult<CachedPayload> {
    let info_bytes = fs::read(base.join(&location.info))?;
    let info: CacheInfo = serde_json::from_slice(&info_bytes)?;

    if info.is_expired(now, ttl) {
        return Err(NetworkError::CacheExpired {
            path: location.payload.display().to_string(),
        });
    }

    let bytes = fs::read(base.join(&location.payload))?;
    Ok(CachedPayload {
        bytes,
        created_at: info.created_at,
    })
}

/// Payload first, metadata second; a failed payload write never leaves
/// metadata pointing at it
fn write_entry(
    base: &Path,
    location: &CacheLocation,
    bytes: &[u8],
    created_at: DateTime<Utc>
) -> NetworkResult<()> {
    write_atomic(&base.join(&location.payload), bytes)?;

    let info = CacheInfo::new(location, created_at);
    let info_bytes = serde_json::to_vec(&info)?;
    write_atomic(&base.join(&location.info), &info_bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> NetworkResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            NetworkError::Serialization(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|e| {
        NetworkError::Serialization(format!("failed to write {}: {}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        NetworkError::Serialization(format!("failed to move {} into place: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86_400);

    fn store(dir: &TempDir) -> CacheStore {
        CacheStore::open(Some(dir.path().join("cache")), DAY * 15)
    }

    fn put_and_wait(store: &CacheStore, path: &str, bytes: &[u8]) -> NetworkResult<()> {
        let (tx, rx) = mpsc::channel();
        store.put(path, bytes.to_vec(), Some(Box::new(move |result| {
            let _ = tx.send(result);
        })));
        rx.recv().unwrap()
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.is_available());

        put_and_wait(&store, "Users/AAA.request", b"{\"name\":\"A\"}").unwrap();
        assert_eq!(store.get("Users/AAA.request"), Some(b"{\"name\":\"A\"}".to_vec()));
        assert_eq!(store.get_string("Users/AAA.request").as_deref(), Some("{\"name\":\"A\"}"));
    }

    #[test]
    fn test_get_immediately_after_put_without_callback() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put_string("Users/BBB.request", "fresh", None);
        assert_eq!(store.get_string("Users/BBB.request").as_deref(), Some("fresh"));

        store.flush();
        assert!(store.pending.lock().is_empty());
        assert_eq!(store.get_string("Users/BBB.request").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_evict_drops_queued_writes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put_string("Users/MMM.request", "queued", None);
        store.evict_group("Users");
        assert_eq!(store.get("Users/MMM.request"), None);

        store.put_string("Orders/NNN.request", "queued", None);
        store.evict_all();
        assert_eq!(store.get("Orders/NNN.request"), None);
    }

    #[test]
    fn test_disk_layout() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        put_and_wait(&store, "Users/CCC.request", b"x").unwrap();
        put_and_wait(&store, "DDD.request", b"y").unwrap();

        let base = dir.path().join("cache");
        assert!(base.join("Users/CCC.request").is_file());
        assert!(base.join("info/Users/CCC.request").is_file());
        assert!(base.join("default/DDD.request").is_file());
        assert!(base.join("info/default/DDD.request").is_file());
    }

    #[test]
    fn test_later_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for i in 0..20 {
            store.put_string("Users/EEE.request", &format!("v{}", i), None);
        }
        store.flush();
        assert_eq!(store.get_string("Users/EEE.request").as_deref(), Some("v19"));
    }

    #[test]
    fn test_store_ttl_boundary() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(Some(dir.path().join("cache")), Duration::from_secs(100));
        let written = Utc::now();

        let (tx, rx) = mpsc::channel();
        store.put_at("Users/FFF.request", b"v".to_vec(), written, Some(Box::new(move |r| {
            let _ = tx.send(r);
        })));
        rx.recv().unwrap().unwrap();

        let just_before = written + chrono::Duration::seconds(99);
        let just_after = written + chrono::Duration::seconds(101);
        assert!(store.get_entry_at("Users/FFF.request", just_before).is_some());
        assert!(store.get_entry_at("Users/FFF.request", just_after).is_none());

        // Expiry only hides the entry; nothing is deleted
        assert!(dir.path().join("cache/Users/FFF.request").is_file());
    }

    #[test]
    fn test_payload_without_metadata_is_miss() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let base = dir.path().join("cache");
        fs::create_dir_all(base.join("Users")).unwrap();
        fs::write(base.join("Users/GGG.request"), b"orphan").unwrap();

        assert_eq!(store.get("Users/GGG.request"), None);

        fs::create_dir_all(base.join("info/Users")).unwrap();
        fs::write(base.join("info/Users/GGG.request"), b"not json").unwrap();
        assert_eq!(store.get("Users/GGG.request"), None);
    }

    #[test]
    fn test_failed_payload_write_skips_metadata() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let base = dir.path().join("cache");
        // A plain file where the group directory should be
        fs::write(base.join("Blocked"), b"").unwrap();

        let result = put_and_wait(&store, "Blocked/HHH.request", b"data");
        assert!(matches!(result, Err(NetworkError::Serialization(_))));
        assert!(!base.join("info/Blocked/HHH.request").exists());
        assert_eq!(store.get("Blocked/HHH.request"), None);
    }

    #[test]
    fn test_evict_group_keeps_other_groups() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        put_and_wait(&store, "Users/III.request", b"u").unwrap();
        put_and_wait(&store, "Orders/JJJ.request", b"o").unwrap();

        store.evict_group("Users");
        assert_eq!(store.get("Users/III.request"), None);
        assert!(!dir.path().join("cache/info/Users").exists());
        assert_eq!(store.get("Orders/JJJ.request"), Some(b"o".to_vec()));

        // Missing group is not an error
        store.evict_group("Nobody");
        store.evict_group("info");
        assert_eq!(store.get("Orders/JJJ.request"), Some(b"o".to_vec()));
    }

    #[test]
    fn test_evict_all_then_write_again() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        put_and_wait(&store, "Users/KKK.request", b"u").unwrap();

        store.evict_all();
        assert_eq!(store.get("Users/KKK.request"), None);
        assert!(dir.path().join("cache").is_dir());

        put_and_wait(&store, "Users/KKK.request", b"again").unwrap();
        assert_eq!(store.get("Users/KKK.request"), Some(b"again".to_vec()));
    }

    #[test]
    fn test_unavailable_store_degrades_silently() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        // Base path nested under a regular file cannot be created
        let store = CacheStore::open(Some(blocker.join("cache")), DAY);
        assert!(!store.is_available());
        assert_eq!(store.get("Users/LLL.request"), None);

        let result = put_and_wait(&store, "Users/LLL.request", b"x");
        assert!(matches!(result, Err(NetworkError::CacheUnavailable(_))));

        store.evict_all();
        store.evict_group("Users");
        store.flush();
    }

    #[test]
    fn test_file_at_base_path_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("cache");
        fs::write(&base, b"file").unwrap();

        let store = CacheStore::open(Some(base.clone()), DAY);
        assert!(!store.is_available());
        assert!(base.is_file());
        assert_eq!(fs::read(&base).unwrap(), b"file");
    }

    #[test]
    fn test_invalid_path_reported() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(put_and_wait(&store, "../escape.request", b"x").is_err());
        assert_eq!(store.get("../escape.request"), None);
    }
}
