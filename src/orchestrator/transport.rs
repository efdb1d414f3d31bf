/// Transport seam and the reqwest-backed implementation
///
/// The orchestrator only needs "send this call, give me status and body";
/// TLS, redirects and connection reuse stay inside reqwest.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{NetworkConfig, ParameterEncoding};
use crate::errors::{NetworkError, NetworkResult};
use crate::request::{parameter_pairs, Parameters};

/// Everything needed to put one request on the wire
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Already passed through the encrypt hook
    pub parameters: Parameters,
    pub encoding: ParameterEncoding,
}

impl OutboundCall {
    /// GET, HEAD and DELETE carry URL-encoded parameters in the query string
    pub fn uses_query(&self) -> bool {
        self.encoding == ParameterEncoding::Url &&
            matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call; any status is a response, only I/O problems are errors
    async fn execute(&self, call: OutboundCall) -> NetworkResult<TransportResponse>;
}

/// Settings whose change rebuilds the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub max_connections_per_host: usize,
}

impl SessionSettings {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs_f64(config.timeout_secs.max(0.001)),
            max_connections_per_host: config.max_connections_per_host.max(1),
        }
    }
}

/// HTTP transport with a request timeout and a per-host concurrency cap
pub struct HttpTransport {
    client: Client,
    settings: SessionSettings,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpTransport {
    pub fn new(settings: SessionSettings) -> NetworkResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(settings.max_connections_per_host)
            .build()
            .map_err(|e| NetworkError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            hosts: Mutex::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Wait for a free connection slot on the call's host
    async fn acquire_host_slot(&self, url: &str) -> NetworkResult<OwnedSemaphorePermit> {
        let parsed = url::Url::parse(url)
            .map_err(|e| NetworkError::InvalidTarget(format!("{}: {}", url, e)))?;
        let host = format!(
            "{}:{}",
            parsed.host_str().unwrap_or(""),
            parsed.port_or_known_default().unwrap_or(0)
        );

        let semaphore = self.hosts
            .lock()
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.settings.max_connections_per_host)))
            .clone();

        semaphore
            .acquire_owned()
            .await
            .map_err(|e| NetworkError::transport(format!("Failed to acquire connection slot: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, call: OutboundCall) -> NetworkResult<TransportResponse> {
        let _slot = self.acquire_host_slot(&call.url).await?;

        let mut builder = self.client.request(call.method.clone(), &call.url).headers(call.headers.clone());
        if !call.parameters.is_empty() {
            builder = match call.encoding {
                ParameterEncoding::Url if call.uses_query() => builder.query(&parameter_pairs(&call.parameters)),
                ParameterEncoding::Url => builder.form(&parameter_pairs(&call.parameters)),
                ParameterEncoding::Json => builder.json(&call.parameters),
            };
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: Method, encoding: ParameterEncoding) -> OutboundCall {
        OutboundCall {
            method,
            url: "http://api.test/users".to_string(),
            headers: HeaderMap::new(),
            parameters: Parameters::new(),
            encoding,
        }
    }

    #[test]
    fn test_query_only_for_url_encoded_reads() {
        assert!(call(Method::GET, ParameterEncoding::Url).uses_query());
        assert!(call(Method::DELETE, ParameterEncoding::Url).uses_query());
        assert!(!call(Method::POST, ParameterEncoding::Url).uses_query());
        assert!(!call(Method::GET, ParameterEncoding::Json).uses_query());
    }

    #[test]
    fn test_success_range() {
        let ok = TransportResponse { status: 204, body: String::new() };
        let redirect = TransportResponse { status: 304, body: "cached".into() };
        let error = TransportResponse { status: 500, body: "oops".into() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!error.is_success());
    }

    #[test]
    fn test_session_settings_clamped() {
        let mut config = NetworkConfig::default();
        config.max_connections_per_host = 0;
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.max_connections_per_host, 1);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_sending() {
        let transport = HttpTransport::new(SessionSettings {
            timeout: Duration::from_secs(1),
            max_connections_per_host: 2,
        }).unwrap();
        let mut bad = call(Method::GET, ParameterEncoding::Url);
        bad.url = "not a url".to_string();

        let result = transport.execute(bad).await;
        assert!(matches!(result, Err(NetworkError::InvalidTarget(_))));
    }
}
