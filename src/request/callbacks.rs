/// Caller-supplied result callbacks
///
/// Callbacks are shared (`Arc<dyn Fn>`) because one send can deliver twice:
/// once from the cache, once from the network.
use std::sync::Arc;

use crate::errors::NetworkError;

/// `(value, from_cache)`
pub type SuccessCallback = Arc<dyn Fn(Option<&str>, bool) + Send + Sync>;

pub type FailureCallback = Arc<dyn Fn(&NetworkError) + Send + Sync>;

/// `(value, error, from_cache)`
pub type CompletionCallback = Arc<dyn Fn(Option<&str>, Option<&NetworkError>, bool) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub success: Option<SuccessCallback>,
    pub failure: Option<FailureCallback>,
    pub completion: Option<CompletionCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, f: F) -> Self where F: Fn(Option<&str>, bool) + Send + Sync + 'static {
        self.success = Some(Arc::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self where F: Fn(&NetworkError) + Send + Sync + 'static {
        self.failure = Some(Arc::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
        where F: Fn(Option<&str>, Option<&NetworkError>, bool) + Send + Sync + 'static
    {
        self.completion = Some(Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.failure.is_none() && self.completion.is_none()
    }

    /// success then completion
    pub(crate) fn deliver_success(&self, value: Option<&str>, from_cache: bool) {
        if let Some(success) = &self.success {
            success(value, from_cache);
        }
        if let Some(completion) = &self.completion {
            completion(value, None, from_cache);
        }
    }

    /// failure then completion; a failure never comes from the cache
    pub(crate) fn deliver_failure(&self, value: Option<&str>, error: &NetworkError) {
        if let Some(failure) = &self.failure {
            failure(error);
        }
        if let Some(completion) = &self.completion {
            completion(value, Some(error), false);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("success", &self.success.is_some())
            .field("failure", &self.failure.is_some())
            .field("completion", &self.completion.is_some())
            .finish()
    }
}
