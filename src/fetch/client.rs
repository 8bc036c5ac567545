//! HTTP client creation and the production transport.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{cookie::Jar, header};
use std::sync::Arc;
use tracing::debug;

use super::types::{FetchError, HttpTransport};
use crate::TARGET_WEB_REQUEST;

const USER_AGENT: &str = "scorewirebot/0.1 (+https://github.com/scorewire/scorewire)";

/// Create the shared HTTP client used for all upstream requests.
pub fn create_http_client() -> Result<reqwest::Client> {
    let cookie_store = Jar::default();
    debug!(target: TARGET_WEB_REQUEST, "Creating HTTP client");

    reqwest::Client::builder()
        .cookie_store(true)
        .cookie_provider(Arc::new(cookie_store))
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// [`HttpTransport`] backed by reqwest. Request timeouts are enforced by the
/// caller ([`super::fetcher::EthicalFetcher`]), not here.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(
                header::ACCEPT,
                "application/json, text/html, text/plain, */*;q=0.9",
            )
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
