//! Page fetch collaborator
//!
//! One GET per source page. The trait is the seam the extractor depends on
//! so tests can substitute canned HTML.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use crate::config::ScraperSettings;
use crate::error::{Error, Result};

/// Fetches the HTML body of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Perform exactly one request for `url` and return the body.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// `PageFetcher` over HTTP with a fixed browser-like `User-Agent`.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(settings: &ScraperSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&settings.user_agent).map_err(|e| {
            Error::config_field_invalid("scraper.user_agent", e.to_string())
        })?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching source page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("status {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {}", e)))
    }
}
