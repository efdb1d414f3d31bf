//! Request entities, their hooks and callbacks

pub mod callbacks;
pub mod entity;
pub mod hooks;
pub mod params;

pub use callbacks::{Callbacks, CompletionCallback, FailureCallback, SuccessCallback};
pub use entity::{CachePolicy, RequestEntity, Target, DEFAULT_CACHE_FOLDER};
pub use hooks::{Outcome, PassThroughHooks, RequestHooks, RequestLifecycle};
pub use params::{has_scheme, join_url, merge_parameters, parameter_pairs, Parameters};
