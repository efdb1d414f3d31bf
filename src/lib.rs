//! reqcache - HTTP request orchestration with an in-flight registry and a
//! fingerprinted disk cache
//!
//! ```no_run
//! use reqcache::config::Config;
//! use reqcache::orchestrator::OrchestratorBuilder;
//! use reqcache::request::{Callbacks, Parameters};
//!
//! # async fn run() -> reqcache::errors::NetworkResult<()> {
//! let mut config = Config::default();
//! config.network.base_url = "https://api.example.com".to_string();
//!
//! let orchestrator = OrchestratorBuilder::new(config).build()?;
//! orchestrator.send(
//!     reqwest::Method::GET,
//!     "/users",
//!     Parameters::new(),
//!     Callbacks::new().on_success(|value, from_cache| {
//!         println!("{:?} (cached: {})", value, from_cache);
//!     })
//! );
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod logger;
pub mod orchestrator;
pub mod paths;
pub mod registry;
pub mod request;

pub use errors::{NetworkError, NetworkResult};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use registry::{RequestId, RequestRegistry, TrackedRequest};
pub use request::{Callbacks, RequestEntity, RequestHooks};
