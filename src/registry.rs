/// In-flight request registry
///
/// Maps request identity to everything captured when the request was sent:
/// the entity, its resolved URL and cache path, the caller's callbacks and
/// the handle that aborts its outbound call. Every operation takes the same lock, so operations are
/// linearizable: when completion and cancellation race for one identity,
/// `remove_and_return` hands the record to exactly one of them.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::logger::{self, LogTag};
use crate::request::{Callbacks, RequestEntity};

/// Identity assigned to a request when it is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry record; whoever removes it owns the terminal handling
///
/// Fixed at send time. A later send of the same entity rebinds the entity,
/// never this record.
pub struct TrackedRequest {
    pub id: RequestId,
    pub entity: Arc<RequestEntity>,
    pub url: String,
    pub cache_path: String,
    pub callbacks: Callbacks,
    pub abort: Option<AbortHandle>,
}

impl TrackedRequest {
    pub fn new(id: RequestId, entity: Arc<RequestEntity>, url: String, callbacks: Callbacks) -> Self {
        let cache_path = entity.cache_file_path_for(&url);
        Self {
            id,
            entity,
            url,
            cache_path,
            callbacks,
            abort: None,
        }
    }

    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Tell the outbound call to stop; no-op once it has finished
    pub fn abort(&self) {
        if let Some(handle) = &self.abort {
            handle.abort();
        }
    }
}

#[derive(Default)]
pub struct RequestRegistry {
    records: Mutex<HashMap<RequestId, TrackedRequest>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// False when the identity is taken; an existing record is never
    /// overwritten.
    pub fn add(&self, record: TrackedRequest) -> bool {
        let id = record.id;
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            logger::warning(LogTag::Registry, &format!("Request {} is already registered", id));
            return false;
        }
        records.insert(id, record);
        logger::verbose(LogTag::Registry, &format!("Registered {} ({} in flight)", id, records.len()));
        true
    }

    /// Atomic lookup-and-delete
    pub fn remove_and_return(&self, id: &RequestId) -> Option<TrackedRequest> {
        let removed = self.records.lock().remove(id);
        if removed.is_some() {
            logger::verbose(LogTag::Registry, &format!("Removed {}", id));
        }
        removed
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.records.lock().contains_key(id)
    }

    pub fn get(&self, id: &RequestId) -> Option<Arc<RequestEntity>> {
        self.records.lock().get(id).map(|record| record.entity.clone())
    }

    /// Callbacks of a request that is still tracked
    pub fn callbacks(&self, id: &RequestId) -> Option<Callbacks> {
        self.records.lock().get(id).map(|record| record.callbacks.clone())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove every record at once
    pub fn drain(&self) -> Vec<TrackedRequest> {
        self.records
            .lock()
            .drain()
            .map(|(_, record)| record)
            .collect()
    }
}
