//! Request orchestration
//!
//! The orchestrator sends entities, tracks them in the registry while they
//! are in flight, serves cached values ahead of the network and routes every
//! result through the hooks to the caller's callbacks.
//!
//! Per send the flow is:
//! 1. bind a fresh identity, resolve the URL, build the outbound call
//! 2. spawn the network task (held back until step 4) and register it
//! 3. look the request up in the cache on a blocking thread; a hit is
//!    delivered with `from_cache = true` while the send stays registered
//! 4. release the network task; its result goes through `complete`
//!
//! Completion and cancellation both start with `remove_and_return`, so
//! exactly one of them handles a given send.

mod default;
mod session;
mod transport;


use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Method;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::cache::CacheStore;
use crate::config::{Config, ParameterEncoding};
use crate::errors::{NetworkError, NetworkResult};
use crate::logger::{self, LogTag};
use crate::registry::{RequestId, RequestRegistry, TrackedRequest};
use crate::request::{
    Callbacks, Outcome, Parameters, PassThroughHooks, RequestEntity, RequestHooks, Target,
};

pub use default::{default_orchestrator, init_default, send_path, send_url};
pub use session::{http_transport_factory, TransportFactory};
pub use transport::{HttpTransport, OutboundCall, SessionSettings, Transport, TransportResponse};

use session::Session;

pub struct OrchestratorBuilder {
    config: Config,
    hooks: Option<Arc<dyn RequestHooks>>,
    store: Option<Arc<CacheStore>>,
    factory: Option<TransportFactory>,
    runtime: Option<Handle>,
}

impl OrchestratorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hooks: None,
            store: None,
            factory: None,
            runtime: None,
        }
    }

    pub fn hooks(mut self, hooks: Arc<dyn RequestHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Use an existing store instead of opening one from `[cache]`
    pub fn cache_store(mut self, store: Arc<CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport_factory(mut self, factory: TransportFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Runtime that runs transport calls; defaults to the current one
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> NetworkResult<Arc<Orchestrator>> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None =>
                Handle::try_current().map_err(|_| {
                    NetworkError::Config(
                        "no tokio runtime: build the orchestrator inside one or pass a handle".to_string()
                    )
                })?,
        };

        let factory = self.factory.unwrap_or_else(http_transport_factory);
        let settings = SessionSettings::from_config(&self.config.network);
        let session = Session::build(settings, &factory)?;

        let store = self.store.unwrap_or_else(|| Arc::new(CacheStore::from_config(&self.config.cache)));
        let base_url = self.config.network.resolved_base_url();

        logger::info(
            LogTag::System,
            &format!(
                "Orchestrator ready (base: {}, timeout: {:.1}s, {} connections/host, cache: {})",
                if base_url.is_empty() { "<none>" } else { base_url.as_str() },
                settings.timeout.as_secs_f64(),
                settings.max_connections_per_host,
                if store.is_available() { "on" } else { "off" }
            )
        );

        Ok(
            Arc::new(Orchestrator {
                base_url,
                parameter_encoding: self.config.network.parameter_encoding,
                default_cache_time: Duration::from_secs(self.config.cache.default_cache_time_secs),
                hooks: self.hooks.unwrap_or_else(|| Arc::new(PassThroughHooks)),
                store,
                registry: RequestRegistry::new(),
                session: RwLock::new(session),
                factory,
                runtime,
            })
        )
    }
}

pub struct Orchestrator {
    base_url: String,
    parameter_encoding: ParameterEncoding,
    default_cache_time: Duration,
    hooks: Arc<dyn RequestHooks>,
    store: Arc<CacheStore>,
    registry: RequestRegistry,
    session: RwLock<Session>,
    factory: TransportFactory,
    runtime: Handle,
}

impl Orchestrator {
    /// Build and send an entity in one go
    ///
    /// `target` with a scheme is used verbatim, anything else is joined with
    /// the base URL. Returns at once; results arrive through `callbacks`.
    pub fn send(
        self: &Arc<Self>,
        method: Method,
        target: &str,
        parameters: Parameters,
        callbacks: Callbacks
    ) -> Arc<RequestEntity> {
        let entity = RequestEntity::new(method, Target::parse(target))
            .with_parameters(parameters)
            .with_cache_time(self.default_cache_time);
        self.send_entity(Arc::new(entity), callbacks)
    }

    /// Send a prepared entity
    ///
    /// An entity still in flight from an earlier send is cancelled first.
    pub fn send_entity(self: &Arc<Self>, entity: Arc<RequestEntity>, callbacks: Callbacks) -> Arc<RequestEntity> {
        if let Some(previous) = entity.id() {
            if self.registry.contains(&previous) {
                logger::debug(LogTag::Request, &format!("Re-sent while {} is in flight, cancelling it", previous));
                self.cancel(&entity);
            }
        }

        let id = RequestId::new();
        let url = entity.target().resolve(&self.base_url);
        entity.bind(id, url.clone(), self.store.clone());

        let call = self.build_call(&entity, url.clone());
        let transport = self.session.read().transport.clone();
        let (release, released) = oneshot::channel::<()>();

        let network = {
            let this = Arc::clone(self);
            self.runtime.spawn(async move {
                // A dropped sender still releases; cancellation goes through abort
                let _ = released.await;
                let result = transport.execute(call).await;
                this.complete(id, result);
            })
        };

        let record = TrackedRequest::new(id, Arc::clone(&entity), url, callbacks).with_abort(network.abort_handle());
        let sent_url = record.url.clone();
        if !self.registry.add(record) {
            network.abort();
            return entity;
        }

        logger::debug(LogTag::Request, &format!("Sent {} {} as {}", entity.method(), sent_url, id));
        entity.notify_will_start();

        let this = Arc::clone(self);
        let cached_entity = Arc::clone(&entity);
        self.runtime.spawn(async move {
            this.deliver_cached(&cached_entity, id).await;
            let _ = release.send(());
        });

        entity
    }

    /// Stop an in-flight send
    ///
    /// Success, failure and completion callbacks never fire for a cancelled
    /// send; only the lifecycle teardown runs. Unsent or finished entities
    /// are left alone.
    pub fn cancel(&self, entity: &RequestEntity) {
        let id = match entity.id() {
            Some(id) => id,
            None => {
                return;
            }
        };
        let tracked = match self.registry.remove_and_return(&id) {
            Some(tracked) => tracked,
            None => {
                return;
            }
        };

        tracked.abort();
        entity.notify_did_complete(true);
        logger::debug(LogTag::Request, &format!("Cancelled {}", id));
    }

    /// Cancel every tracked send
    pub fn cancel_all(&self) {
        let tracked = self.registry.drain();
        if tracked.is_empty() {
            return;
        }

        let count = tracked.len();
        for record in tracked {
            record.abort();
            record.entity.notify_did_complete(true);
        }
        logger::info(LogTag::Request, &format!("Cancelled {} in-flight request(s)", count));
    }

    pub fn is_tracked(&self, entity: &RequestEntity) -> bool {
        entity
            .id()
            .map(|id| self.registry.contains(&id))
            .unwrap_or(false)
    }

    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_settings(&self) -> SessionSettings {
        self.session.read().settings
    }

    /// Drop one cache group (usually an entity's cache folder)
    pub fn evict_group(&self, group: &str) {
        self.store.evict_group(group);
        logger::info(LogTag::Cache, &format!("Evicted cache group '{}'", group));
    }

    pub fn evict_all(&self) {
        self.store.evict_all();
        logger::info(LogTag::Cache, "Evicted all cached responses");
    }

    /// Cancels everything in flight and rebuilds the transport
    pub fn set_timeout(&self, timeout: Duration) -> NetworkResult<()> {
        if timeout.is_zero() {
            return Err(NetworkError::Config("timeout must be greater than zero".to_string()));
        }
        let mut settings = self.session_settings();
        settings.timeout = timeout;
        self.reset_session(settings)
    }

    /// Cancels everything in flight and rebuilds the transport
    pub fn set_max_connections_per_host(&self, max_connections: usize) -> NetworkResult<()> {
        if max_connections == 0 {
            return Err(NetworkError::Config("max_connections_per_host must be greater than zero".to_string()));
        }
        let mut settings = self.session_settings();
        settings.max_connections_per_host = max_connections;
        self.reset_session(settings)
    }

    fn reset_session(&self, settings: SessionSettings) -> NetworkResult<()> {
        let session = Session::build(settings, &self.factory)?;
        self.cancel_all();
        *self.session.write() = session;
        logger::info(
            LogTag::Transport,
            &format!(
                "Session rebuilt (timeout: {:.1}s, {} connections/host)",
                settings.timeout.as_secs_f64(),
                settings.max_connections_per_host
            )
        );
        Ok(())
    }

    fn build_call(&self, entity: &RequestEntity, url: String) -> OutboundCall {
        OutboundCall {
            method: entity.method().clone(),
            url,
            headers: self.hooks.build_headers(entity, entity.headers().clone()),
            parameters: self.hooks.encrypt(entity, entity.parameters().clone()),
            encoding: entity.parameter_encoding(self.parameter_encoding),
        }
    }

    async fn deliver_cached(&self, entity: &Arc<RequestEntity>, id: RequestId) {
        if !entity.cache_policy().use_cache {
            return;
        }

        let lookup = Arc::clone(entity);
        let cached = match self.runtime.spawn_blocking(move || lookup.cache()).await {
            Ok(cached) => cached,
            Err(e) => {
                logger::warning(LogTag::Cache, &format!("Cache lookup for {} failed: {}", id, e));
                None
            }
        };
        let raw = match cached {
            Some(raw) => raw,
            None => {
                return;
            }
        };

        // None when cancelled while the lookup ran
        let callbacks = match self.registry.callbacks(&id) {
            Some(callbacks) => callbacks,
            None => {
                return;
            }
        };

        logger::debug(LogTag::Cache, &format!("Cache hit for {}", id));
        let value = self.decode_success(entity, id, raw, true);
        callbacks.deliver_success(value.as_deref(), true);
    }

    /// Terminal handling of a network result; no-op when cancellation won
    ///
    /// Works from the removed record only: the entity may already be bound
    /// to a newer send with other callbacks and another URL.
    fn complete(&self, id: RequestId, result: NetworkResult<TransportResponse>) {
        let record = match self.registry.remove_and_return(&id) {
            Some(record) => record,
            None => {
                logger::verbose(LogTag::Request, &format!("Result for {} dropped, request no longer tracked", id));
                return;
            }
        };

        match result {
            Ok(response) if response.is_success() => {
                self.complete_success(&record, response.body);
            }
            Ok(response) => {
                let error = NetworkError::status(response.status, &record.url);
                self.complete_failure(&record, error);
            }
            Err(error) => {
                self.complete_failure(&record, error);
            }
        }

        record.entity.notify_did_complete(false);
    }

    /// Any 2xx is cached as received, before the hooks see it
    fn complete_success(&self, record: &TrackedRequest, raw: String) {
        record.entity.save_cache_for(record.id, &raw, &self.store, &record.cache_path);

        let value = self.decode_success(&record.entity, record.id, raw, false);
        record.callbacks.deliver_success(value.as_deref(), false);
    }

    /// decrypt then pre_operation; a successful transfer always reaches the
    /// success path, whatever error the hook reports
    fn decode_success(&self, entity: &RequestEntity, id: RequestId, raw: String, from_cache: bool) -> Option<String> {
        let decrypted = self.hooks.decrypt(entity, raw);
        let outcome = self.hooks.pre_operation(entity, Outcome::success(decrypted), from_cache);
        if let Some(error) = &outcome.error {
            let source = if from_cache { "cached" } else { "network" };
            logger::debug(LogTag::Request, &format!("pre_operation flagged {} {} value: {}", source, id, error));
        }
        outcome.value
    }

    fn complete_failure(&self, record: &TrackedRequest, error: NetworkError) {
        logger::warning(
            LogTag::Transport,
            &format!("{} {} failed: {}", record.entity.method(), record.url, error)
        );

        let outcome = self.hooks.pre_operation(&record.entity, Outcome::failure(error), false);
        match &outcome.error {
            Some(error) => record.callbacks.deliver_failure(outcome.value.as_deref(), error),
            // Recovered by the hook; not cached, the body wasn't a 2xx
            None => record.callbacks.deliver_success(outcome.value.as_deref(), false),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("base_url", &self.base_url)
            .field("parameter_encoding", &self.parameter_encoding)
            .field("session", &self.session_settings())
            .field("in_flight", &self.registry.len())
            .finish()
    }
}
