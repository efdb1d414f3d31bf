/// One logical request and its cache policy
///
/// The immutable part (method, target, parameters, policy) is fixed at
/// construction. The mutable part (identity, binding to a store and base
/// URL, cached snapshot) sits behind a mutex and is driven by the
/// orchestrator. Callbacks belong to a single send and live in its
/// registry record, not here.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::Method;

use super::hooks::RequestLifecycle;
use super::params::{has_scheme, join_url, Parameters};
use crate::cache::info::is_within_ttl;
use crate::cache::{derive_fingerprint, CacheStore};
use crate::config::{ParameterEncoding, DEFAULT_CACHE_TIME_SECS};
use crate::logger::{self, LogTag};
use crate::registry::RequestId;

/// Cache folder used when an entity doesn't name its own
pub const DEFAULT_CACHE_FOLDER: &str = "RequestEntity";

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Used verbatim
    Url(String),
    /// Joined with the orchestrator's base URL
    Path(String),
}

impl Target {
    /// Absolute-looking strings become `Url`, everything else `Path`
    pub fn parse(target: &str) -> Self {
        if has_scheme(target) {
            Target::Url(target.to_string())
        } else {
            Target::Path(target.to_string())
        }
    }

    pub fn resolve(&self, base_url: &str) -> String {
        match self {
            Target::Url(url) if !url.is_empty() => url.clone(),
            Target::Url(_) => join_url(base_url, ""),
            Target::Path(path) => join_url(base_url, path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub use_cache: bool,
    /// Per-request TTL; a hit needs `now - captured_at <= cache_time`
    pub cache_time: Duration,
    /// Keys left out of the fingerprint (timestamps, nonces, ...)
    pub ignore_parameters: Vec<String>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_time: Duration::from_secs(DEFAULT_CACHE_TIME_SECS),
            ignore_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    value: String,
    captured_at: DateTime<Utc>,
}

/// Set when the orchestrator sends the entity
#[derive(Clone)]
struct Binding {
    id: RequestId,
    url: String,
    store: Arc<CacheStore>,
}

#[derive(Default)]
struct EntityState {
    binding: Option<Binding>,
    snapshot: Option<Snapshot>,
}

pub struct RequestEntity {
    method: Method,
    target: Target,
    headers: HeaderMap,
    parameters: Parameters,
    parameter_encoding: Option<ParameterEncoding>,
    policy: CachePolicy,
    cache_folder: String,
    lifecycle: Option<Arc<dyn RequestLifecycle>>,
    state: Mutex<EntityState>,
}

impl RequestEntity {
    pub fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            headers: HeaderMap::new(),
            parameters: Parameters::new(),
            parameter_encoding: None,
            policy: CachePolicy::default(),
            cache_folder: DEFAULT_CACHE_FOLDER.to_string(),
            lifecycle: None,
            state: Mutex::new(EntityState::default()),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, Target::parse(target))
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, Target::parse(target))
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_parameter_encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.parameter_encoding = Some(encoding);
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.policy.use_cache = use_cache;
        self
    }

    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.policy.cache_time = cache_time;
        self
    }

    pub fn with_ignored_parameters(mut self, keys: &[&str]) -> Self {
        self.policy.ignore_parameters = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Separate cached data per user or tenant, e.g. `"users-42"`
    pub fn with_cache_folder(mut self, folder: &str) -> Self {
        self.cache_folder = folder.to_string();
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn RequestLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Entity override, falling back to the orchestrator default
    pub fn parameter_encoding(&self, default: ParameterEncoding) -> ParameterEncoding {
        self.parameter_encoding.unwrap_or(default)
    }

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn cache_folder(&self) -> &str {
        &self.cache_folder
    }

    /// Identity of the most recent send; None before the first send
    pub fn id(&self) -> Option<RequestId> {
        self.state.lock().binding.as_ref().map(|b| b.id)
    }

    /// Resolved URL of the most recent send
    pub fn request_url(&self) -> Option<String> {
        self.state.lock().binding.as_ref().map(|b| b.url.clone())
    }

    /// Fingerprint file name; needs a resolved URL, so None before the first send
    pub fn fingerprint(&self) -> Option<String> {
        let url = self.request_url()?;
        Some(derive_fingerprint(&self.method, &url, &self.parameters, &self.policy.ignore_parameters))
    }

    /// `cache_folder/fingerprint`, the path handed to the cache store
    pub fn cache_file_path(&self) -> Option<String> {
        self.request_url().map(|url| self.cache_file_path_for(&url))
    }

    /// Cache path this request has when sent to `url`
    pub(crate) fn cache_file_path_for(&self, url: &str) -> String {
        let fingerprint = derive_fingerprint(&self.method, url, &self.parameters, &self.policy.ignore_parameters);
        format!("{}/{}", self.cache_folder, fingerprint)
    }

    /// Cached value for this request, if one exists and is fresh
    ///
    /// Checks the in-memory snapshot first; without one, reads the disk
    /// store (blocking) and keeps a hit as the new snapshot.
    pub fn cache(&self) -> Option<String> {
        self.cache_at(Utc::now())
    }

    pub fn cache_at(&self, now: DateTime<Utc>) -> Option<String> {
        if !self.policy.use_cache {
            return None;
        }

        let store = {
            let state = self.state.lock();
            if let Some(snapshot) = &state.snapshot {
                return if is_within_ttl(snapshot.captured_at, now, self.policy.cache_time) {
                    Some(snapshot.value.clone())
                } else {
                    None
                };
            }
            state.binding.as_ref()?.store.clone()
        };

        let path = self.cache_file_path()?;
        let entry = store.get_entry_at(&path, now)?;
        if !is_within_ttl(entry.created_at, now, self.policy.cache_time) {
            logger::debug(LogTag::Cache, &format!("Disk entry older than request TTL: {}", path));
            return None;
        }
        let value = String::from_utf8(entry.bytes).ok()?;

        self.state.lock().snapshot = Some(Snapshot {
            value: value.clone(),
            captured_at: entry.created_at,
        });
        Some(value)
    }

    /// Remember `value` and persist it in the background
    pub fn save_cache(&self, value: &str) {
        self.save_cache_at(value, Utc::now());
    }

    pub(crate) fn save_cache_at(&self, value: &str, now: DateTime<Utc>) {
        let (store, path) = {
            let state = self.state.lock();
            match &state.binding {
                Some(binding) => (Some(binding.store.clone()), Some(self.cache_file_path_for(&binding.url))),
                None => (None, None),
            }
        };
        self.persist(value, now, None, store.as_deref(), path.as_deref());
    }

    /// Save the body of send `id` under the path captured when it was sent
    ///
    /// The snapshot is only replaced while `id` is still the current send; a
    /// newer send may target another URL and owns the snapshot then.
    pub(crate) fn save_cache_for(&self, id: RequestId, value: &str, store: &CacheStore, path: &str) {
        self.persist(value, Utc::now(), Some(id), Some(store), Some(path));
    }

    fn persist(
        &self,
        value: &str,
        now: DateTime<Utc>,
        id: Option<RequestId>,
        store: Option<&CacheStore>,
        path: Option<&str>
    ) {
        if !self.policy.use_cache {
            return;
        }

        {
            let mut state = self.state.lock();
            let current = match (id, &state.binding) {
                (Some(id), Some(binding)) => binding.id == id,
                (Some(_), None) => false,
                (None, _) => true,
            };
            if current {
                state.snapshot = Some(Snapshot {
                    value: value.to_string(),
                    captured_at: now,
                });
            }
        }

        if let (Some(store), Some(path)) = (store, path) {
            store.put_string(path, value, None);
        }
    }

    /// Drop the in-memory snapshot; the disk entry is untouched
    pub fn clear_snapshot(&self) {
        self.state.lock().snapshot = None;
    }

    /// Attach identity, resolved URL and store for a new send
    ///
    /// A different URL invalidates the snapshot, since it belongs to another
    /// fingerprint.
    pub(crate) fn bind(&self, id: RequestId, url: String, store: Arc<CacheStore>) {
        let mut state = self.state.lock();
        let same_url = state.binding.as_ref().map(|b| b.url == url).unwrap_or(false);
        if !same_url {
            state.snapshot = None;
        }
        state.binding = Some(Binding { id, url, store });
    }

    pub(crate) fn notify_will_start(&self) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.will_start(self);
        }
    }

    pub(crate) fn notify_did_complete(&self, cancelled: bool) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.did_complete(self, cancelled);
        }
    }
}

impl std::fmt::Debug for RequestEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEntity")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("parameters", &self.parameters)
            .field("policy", &self.policy)
            .field("cache_folder", &self.cache_folder)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn bound(entity: &RequestEntity, store: Arc<CacheStore>, url: &str) {
        entity.bind(RequestId::new(), url.to_string(), store);
    }

    fn store(dir: &TempDir) -> Arc<CacheStore> {
        Arc::new(CacheStore::open(Some(dir.path().to_path_buf()), Duration::from_secs(15 * 86_400)))
    }

    #[test]
    fn test_target_parse_and_resolve() {
        assert_eq!(Target::parse("https://x.test/a"), Target::Url("https://x.test/a".into()));
        assert_eq!(Target::parse("/users"), Target::Path("/users".into()));
        assert_eq!(Target::parse("/users").resolve("http://api.test/"), "http://api.test/users");
        assert_eq!(Target::parse("https://x.test/a").resolve("http://api.test"), "https://x.test/a");
    }

    #[test]
    fn test_unsent_entity_has_no_identity_or_cache() {
        let entity = RequestEntity::get("/users").with_parameter("id", 5);
        assert!(entity.id().is_none());
        assert!(entity.fingerprint().is_none());
        assert!(entity.cache().is_none());
    }

    #[test]
    fn test_snapshot_ttl_boundary() {
        let entity = RequestEntity::get("/users").with_cache_time(Duration::from_secs(60));
        let t0 = Utc::now();
        entity.save_cache_at("{\"name\":\"A\"}", t0);

        // Fresh right up to and including the TTL, stale one second after
        assert_eq!(entity.cache_at(t0 + chrono::Duration::seconds(30)).as_deref(), Some("{\"name\":\"A\"}"));
        assert!(entity.cache_at(t0 + chrono::Duration::seconds(59)).is_some());
        assert!(entity.cache_at(t0 + chrono::Duration::seconds(60)).is_some());
        assert!(entity.cache_at(t0 + chrono::Duration::seconds(61)).is_none());
    }

    #[test]
    fn test_use_cache_false_never_hits_or_saves() {
        let entity = RequestEntity::get("/users").with_use_cache(false);
        entity.save_cache("value");
        assert!(entity.cache().is_none());
    }

    #[test]
    fn test_stale_send_writes_its_own_path_only() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let entity = RequestEntity::get("/users");

        let first = RequestId::new();
        entity.bind(first, "http://api.test/users".to_string(), store.clone());
        let first_path = entity.cache_file_path().unwrap();
        bound(&entity, store.clone(), "http://other.test/users");

        entity.save_cache_for(first, "late", &store, &first_path);
        store.flush();

        assert_eq!(store.get_string(&first_path).as_deref(), Some("late"));
        // The current binding has neither a snapshot nor a disk entry
        assert!(entity.cache().is_none());
    }

    #[test]
    fn test_disk_hit_populates_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let writer = RequestEntity::get("/users").with_parameter("id", 5);
        bound(&writer, store.clone(), "http://api.test/users");
        writer.save_cache("{\"name\":\"A\"}");
        store.flush();

        let reader = RequestEntity::get("/users").with_parameter("id", 5);
        bound(&reader, store.clone(), "http://api.test/users");
        assert_eq!(reader.cache().as_deref(), Some("{\"name\":\"A\"}"));

        // Served from memory once the disk copy is gone
        store.evict_all();
        assert_eq!(reader.cache().as_deref(), Some("{\"name\":\"A\"}"));
    }

    #[test]
    fn test_disk_entry_respects_request_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let writer = RequestEntity::get("/users").with_cache_time(Duration::from_secs(60));
        bound(&writer, store.clone(), "http://api.test/users");
        writer.save_cache("old");
        store.flush();

        let reader = RequestEntity::get("/users").with_cache_time(Duration::from_secs(60));
        bound(&reader, store.clone(), "http://api.test/users");
        assert!(reader.cache_at(Utc::now() + chrono::Duration::seconds(120)).is_none());
        assert_eq!(reader.cache().as_deref(), Some("old"));
    }

    #[test]
    fn test_cache_folder_and_ignored_parameters_shape_path() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let a = RequestEntity::get("/feed")
            .with_cache_folder("user-1")
            .with_ignored_parameters(&["ts"])
            .with_parameter("ts", json!(1));
        let b = RequestEntity::get("/feed")
            .with_cache_folder("user-1")
            .with_ignored_parameters(&["ts"])
            .with_parameter("ts", json!(2));
        bound(&a, store.clone(), "http://api.test/feed");
        bound(&b, store.clone(), "http://api.test/feed");

        let path = a.cache_file_path().unwrap();
        assert!(path.starts_with("user-1/"));
        assert_eq!(Some(path), b.cache_file_path());
    }

    #[test]
    fn test_rebinding_to_other_url_drops_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let entity = RequestEntity::get("/users");

        bound(&entity, store.clone(), "http://one.test/users");
        entity.save_cache("one");
        store.flush();
        bound(&entity, store.clone(), "http://two.test/users");
        assert!(entity.cache().is_none());
    }
}
