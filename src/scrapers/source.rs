//! Page sources
//!
//! The live source is a single HTTPS GET with no retries; a failed request
//! ends the cycle. `StaticPageSource` serves a fixed document for offline
//! runs and tests.

use crate::error::IngestError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SOURCE_URL: &str = "https://www.playoffstatus.com/nfl/nflpostseasonprob.html";

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Where the document comes from, for logs and errors
    fn location(&self) -> &str;

    async fn fetch(&self) -> Result<String, IngestError>;
}

pub struct HttpPageSource {
    client: Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("playoff-odds/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String, IngestError> {
        debug!(url = %self.url, "Fetching source page");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::fetch(&self.url, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::fetch(&self.url, e))?;

        info!(url = %self.url, bytes = body.len(), "📥 Source page fetched");
        Ok(body)
    }
}

/// Serves a document held in memory. The body can be swapped between
/// cycles to simulate the upstream page changing.
pub struct StaticPageSource {
    label: String,
    body: RwLock<String>,
}

impl StaticPageSource {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: RwLock::new(body.into()),
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML file {}", path))?;
        Ok(Self::new(path, body))
    }

    pub fn set_body(&self, body: impl Into<String>) {
        *self.body.write() = body.into();
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    fn location(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<String, IngestError> {
        Ok(self.body.read().clone())
    }
}
