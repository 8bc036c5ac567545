//! Type definitions for the fetch module.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors surfaced by the ethical fetcher and its collaborators.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("robots rules disallow fetching {url}")]
    RobotsDisallowed { url: String },
    #[error("request to {url} timed out after {attempts} attempts")]
    Timeout { url: String, attempts: usize },
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RobotsDisallowed { .. } => false,
            FetchError::InvalidUrl { .. } => false,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
        }
    }
}

/// The raw HTTP GET seam. Production uses [`super::client::ReqwestTransport`];
/// tests substitute a canned transport and count egress calls.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Extracts the origin host from a URL string.
pub fn host_of(url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
        url: url.to_string(),
    })?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("https://stats.example.com/nba/scores").unwrap(),
            "stats.example.com"
        );
        assert!(host_of("not a url").is_err());
    }

    #[test]
    fn retryability() {
        assert!(FetchError::Timeout {
            url: "u".into(),
            attempts: 1
        }
        .is_retryable());
        assert!(FetchError::Status {
            status: 503,
            url: "u".into()
        }
        .is_retryable());
        assert!(!FetchError::Status {
            status: 404,
            url: "u".into()
        }
        .is_retryable());
        assert!(!FetchError::RobotsDisallowed { url: "u".into() }.is_retryable());
    }
}
