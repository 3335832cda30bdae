use async_trait::async_trait;
use hlsproxy_common::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use url::Url;

use super::{FetchedResource, OriginFetcher};
use crate::config::UpstreamConfig;

/// [`OriginFetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&UpstreamConfig::default())
    }
}

#[async_trait]
impl OriginFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::upstream(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(format!("GET {} returned {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::upstream(format!("Reading body of {} failed: {}", url, e)))?;

        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            content_type = ?content_type,
            "Fetched origin resource"
        );

        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }
}
