//! Fingerprinted disk cache
//!
//! - `key`: request → fingerprint file name
//! - `info`: relative path → payload/metadata locations, metadata record
//! - `storage`: the store itself, with its reader and writer workers
//! - `worker`: the serial job queue both workers are built on

pub mod info;
pub mod key;
pub mod storage;
mod worker;

pub use info::{CacheInfo, CacheLocation, DEFAULT_GROUP};
pub use key::{canonical_parameters, derive_fingerprint, CACHE_FILE_SUFFIX};
pub use storage::{CacheStore, CachedPayload, PutCallback};
