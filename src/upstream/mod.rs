//! Origin fetching.
//!
//! The proxy reaches origins only through [`OriginFetcher`], so tests can
//! substitute counting or failing doubles for the real HTTP client.

mod http;
mod inflight;

pub use http::HttpFetcher;
pub use inflight::{InflightFetches, InflightGuard};

use async_trait::async_trait;
use bytes::Bytes;
use hlsproxy_common::Result;
use url::Url;

/// Body and declared content type of a successful origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Fetches resources from their origin.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Fetch `url`. Transport failures and non-success statuses are
    /// [`hlsproxy_common::Error::UpstreamFetch`].
    async fn fetch(&self, url: &Url) -> Result<FetchedResource>;
}
