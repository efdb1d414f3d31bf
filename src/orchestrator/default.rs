/// Process-wide default orchestrator
///
/// Nothing is created implicitly: `init_default` must run once at startup
/// (inside a tokio runtime) before the `send_*` helpers work.
use std::sync::Arc;

use once_cell::sync::OnceCell;
use reqwest::Method;

use super::{Orchestrator, OrchestratorBuilder};
use crate::config::Config;
use crate::errors::{NetworkError, NetworkResult};
use crate::request::{has_scheme, Callbacks, Parameters, RequestEntity};

static DEFAULT: OnceCell<Arc<Orchestrator>> = OnceCell::new();

pub fn init_default(config: Config) -> NetworkResult<Arc<Orchestrator>> {
    if DEFAULT.get().is_some() {
        return Err(NetworkError::Config("default orchestrator already initialized".to_string()));
    }
    let orchestrator = OrchestratorBuilder::new(config).build()?;
    DEFAULT.set(orchestrator.clone()).map_err(|_| {
        NetworkError::Config("default orchestrator already initialized".to_string())
    })?;
    Ok(orchestrator)
}

pub fn default_orchestrator() -> Option<Arc<Orchestrator>> {
    DEFAULT.get().cloned()
}

fn require_default() -> NetworkResult<Arc<Orchestrator>> {
    default_orchestrator().ok_or_else(|| {
        NetworkError::Config("default orchestrator not initialized, call init_default first".to_string())
    })
}

/// Send to an absolute URL through the default orchestrator
pub fn send_url(
    method: Method,
    url: &str,
    parameters: Parameters,
    callbacks: Callbacks
) -> NetworkResult<Arc<RequestEntity>> {
    if !has_scheme(url) {
        return Err(NetworkError::InvalidTarget(format!("not an absolute URL: {}", url)));
    }
    Ok(require_default()?.send(method, url, parameters, callbacks))
}

/// Send to a path under the default orchestrator's base URL
pub fn send_path(
    method: Method,
    path: &str,
    parameters: Parameters,
    callbacks: Callbacks
) -> NetworkResult<Arc<RequestEntity>> {
    if has_scheme(path) {
        return Err(NetworkError::InvalidTarget(format!("expected a path, got a URL: {}", path)));
    }
    Ok(require_default()?.send(method, path, parameters, callbacks))
}
