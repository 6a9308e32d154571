use crate::error::{AppError, Result};
use crate::knowledge::{parse_method_map, MethodEntries};
use crate::source::DocumentSource;
use async_trait::async_trait;
use std::time::Duration;

/// Downloads the mapping as JSON from a URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    http_client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("api-docs-kb/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            url: url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<MethodEntries> {
        let response = self
            .http_client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response.text().await?;
        let entries = parse_method_map(&body)?;
        tracing::debug!(url = %self.url, methods = entries.len(), "Downloaded methods");
        Ok(entries)
    }
}
