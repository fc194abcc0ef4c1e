use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin wrapper over a shared `reqwest::Client`. One request per call,
/// no retries.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a session cookie on first contact
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// GET `url`, returning the status and body without judging either.
    pub async fn get_text(&self, url: &Url) -> Result<(StatusCode, String), reqwest::Error> {
        debug!("GET {}", url);

        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        debug!("{} -> {} ({} bytes)", url, status, body.len());
        Ok((status, body))
    }
}
