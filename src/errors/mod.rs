/// Error types shared by the cache, registry and orchestrator layers
///
/// Every failure that reaches a caller is delivered as a value through a
/// callback; nothing in the request path panics or unwinds across the
/// registry/cache boundary.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Transport error: {message}")] Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("Cache unavailable: {0}")] CacheUnavailable(String),

    #[error("Cache entry expired: {path}")] CacheExpired {
        path: String,
    },

    #[error("Serialization error: {0}")] Serialization(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Invalid request target: {0}")] InvalidTarget(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    pub fn transport(message: impl Into<String>) -> Self {
        NetworkError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Non-2xx response; the body is kept out of the message
    pub fn status(status: u16, url: &str) -> Self {
        NetworkError::Transport {
            message: format!("unacceptable status {} from {}", status, url),
            status: Some(status),
        }
    }

    /// HTTP status carried by a transport failure, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetworkError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Cache-side faults never fail a request; they only disable caching
    pub fn is_cache_fault(&self) -> bool {
        matches!(
            self,
            NetworkError::CacheUnavailable(_) |
                NetworkError::CacheExpired { .. } |
                NetworkError::Serialization(_)
        )
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::Transport {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_code() {
        let err = NetworkError::status(404, "http://example.com/a");
        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("404"));
        assert!(!err.is_cache_fault());
    }

    #[test]
    fn test_cache_faults_classified() {
        assert!(NetworkError::CacheUnavailable("no dir".into()).is_cache_fault());
        assert!(NetworkError::Serialization("disk full".into()).is_cache_fault());
        assert!(!NetworkError::transport("reset").is_cache_fault());
        assert_eq!(NetworkError::transport("reset").status_code(), None);
    }
}
