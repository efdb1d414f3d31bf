/// Pluggable transformation hooks
///
/// Every request passes through one `RequestHooks` implementation: headers
/// and parameters on the way out, body decryption and a value/error rewrite
/// on the way back. The defaults pass everything through untouched.
use reqwest::header::HeaderMap;

use super::entity::RequestEntity;
use super::params::Parameters;
use crate::errors::NetworkError;

/// Result of a request as seen by callbacks: a value, an error, or (after a
/// hook rewrote it) both or neither
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub value: Option<String>,
    pub error: Option<NetworkError>,
}

impl Outcome {
    pub fn success(value: impl Into<String>) -> Self {
        Self { value: Some(value.into()), error: None }
    }

    pub fn failure(error: NetworkError) -> Self {
        Self { value: None, error: Some(error) }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

pub trait RequestHooks: Send + Sync {
    /// Final headers for the outbound call
    fn build_headers(&self, _request: &RequestEntity, headers: HeaderMap) -> HeaderMap {
        headers
    }

    /// Parameters as they go on the wire
    fn encrypt(&self, _request: &RequestEntity, parameters: Parameters) -> Parameters {
        parameters
    }

    /// Raw body (network or cache) to the text handed to `pre_operation`
    fn decrypt(&self, _request: &RequestEntity, body: String) -> String {
        body
    }

    /// Last word before callbacks fire; may unwrap an envelope, recover an
    /// error into a value, or turn a value into an error
    fn pre_operation(&self, _request: &RequestEntity, outcome: Outcome, _from_cache: bool) -> Outcome {
        outcome
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHooks;

impl RequestHooks for PassThroughHooks {}

/// Per-entity lifecycle notifications
pub trait RequestLifecycle: Send + Sync {
    /// Registered, about to check the cache and dispatch
    fn will_start(&self, _request: &RequestEntity) {}

    /// Terminal teardown; `cancelled` is true only for the cancellation path
    fn did_complete(&self, _request: &RequestEntity, _cancelled: bool) {}
}
