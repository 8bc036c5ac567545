//! The sole network egress point for all source adapters.

use rand::Rng;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use super::robots::RobotsChecker;
use super::types::{host_of, FetchError, HttpTransport};
use crate::config::PipelineConfig;
use crate::TARGET_WEB_REQUEST;

/// Wraps raw retrieval with robots compliance, per-host rate limiting, a
/// bounded timeout, and retry with exponential backoff.
///
/// No adapter issues network calls directly; everything goes through here.
pub struct EthicalFetcher {
    robots: Arc<RobotsChecker>,
    rate_limiter: Arc<RateLimiter>,
    transport: Arc<dyn HttpTransport>,
    request_timeout: Duration,
    max_retries: usize,
    retry_delay: Duration,
}

impl EthicalFetcher {
    pub fn new(
        robots: Arc<RobotsChecker>,
        rate_limiter: Arc<RateLimiter>,
        transport: Arc<dyn HttpTransport>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            robots,
            rate_limiter,
            transport,
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        }
    }

    /// Fetches `url` and returns the response body.
    ///
    /// Robots rules are consulted before any request is made; a disallow
    /// fails without touching the network. Timeouts and transient failures
    /// are retried up to the configured bound.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !self.robots.can_fetch(url).await {
            warn!(target: TARGET_WEB_REQUEST, "Robots rules disallow {}", url);
            return Err(FetchError::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        let host = host_of(url)?;
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.rate_limiter.wait_if_needed(&host).await;

            debug!(target: TARGET_WEB_REQUEST, "GET {} (attempt {})", url, attempts);
            let error = match timeout(self.request_timeout, self.transport.get(url)).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(err)) => err,
                Err(_) => FetchError::Timeout {
                    url: url.to_string(),
                    attempts,
                },
            };

            if !error.is_retryable() || attempts > self.max_retries {
                warn!(
                    target: TARGET_WEB_REQUEST,
                    "Request to {} failed after {} attempts: {}", url, attempts, error
                );
                return Err(error);
            }

            let backoff = self.backoff_delay(attempts);
            debug!(
                target: TARGET_WEB_REQUEST,
                "Request to {} failed ({}); retrying in {:?}", url, error, backoff
            );
            sleep(backoff).await;
        }
    }

    /// Exponential backoff with a little jitter so parallel cycles against
    /// the same upstream don't retry in lockstep.
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let base = self.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1) as u32);
        let jitter_ms = rand::rng().random_range(0..=50);
        base + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        calls: AtomicUsize,
        robots_body: String,
        body: Result<String, u16>,
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            if url.ends_with("/robots.txt") {
                return Ok(self.robots_body.clone());
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.body {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(FetchError::Status {
                    status: *status,
                    url: url.to_string(),
                }),
            }
        }
    }

    fn fetcher_with(transport: Arc<CountingTransport>) -> EthicalFetcher {
        let config = PipelineConfig {
            min_request_interval: Duration::from_millis(1),
            retry_delay: Duration::from_millis(1),
            max_retries: 2,
            ..PipelineConfig::default()
        };
        let robots = Arc::new(RobotsChecker::new(
            transport.clone() as Arc<dyn HttpTransport>,
            config.robots_cache_ttl,
        ));
        let limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        EthicalFetcher::new(robots, limiter, transport, &config)
    }

    #[tokio::test]
    async fn disallowed_url_never_reaches_transport() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
            robots_body: "User-agent: *\nDisallow: /\n".to_string(),
            body: Ok("unused".to_string()),
        });
        let fetcher = fetcher_with(transport.clone());

        let result = fetcher.fetch("https://host.example/scores").await;
        assert!(matches!(result, Err(FetchError::RobotsDisallowed { .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_passes_body_through() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
            robots_body: "User-agent: *\nDisallow:\n".to_string(),
            body: Ok("payload".to_string()),
        });
        let fetcher = fetcher_with(transport.clone());

        let body = fetcher.fetch("https://host.example/scores").await.unwrap();
        assert_eq!(body, "payload");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_to_exhaustion() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
            robots_body: String::new(),
            body: Err(503),
        });
        let fetcher = fetcher_with(transport.clone());

        let result = fetcher.fetch("https://host.example/scores").await;
        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        // first attempt + max_retries
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
            robots_body: String::new(),
            body: Err(404),
        });
        let fetcher = fetcher_with(transport.clone());

        let result = fetcher.fetch("https://host.example/missing").await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
