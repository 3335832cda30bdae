//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which runs a [`ProxyServer`] on a random loopback
//! port with its cache in a temporary directory, next to a wiremock server
//! that plays the origin.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hlsproxy::config::{CacheConfig, Config, ServerConfig};
use hlsproxy::upstream::{FetchedResource, HttpFetcher, OriginFetcher};
use hlsproxy::ProxyServer;
use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

/// A running proxy plus a mock origin.
pub struct TestHarness {
    pub server: ProxyServer,
    pub addr: SocketAddr,
    pub origin: MockServer,
    pub cache_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestHarness {
    /// Start a proxy that fetches over HTTP.
    pub async fn start() -> Self {
        Self::with_fetcher(Arc::new(HttpFetcher::default())).await
    }

    /// Start a proxy around a custom fetcher.
    pub async fn with_fetcher(fetcher: Arc<dyn OriginFetcher>) -> Self {
        let cache_dir = TempDir::new().expect("failed to create cache dir");
        let config = test_config(&cache_dir);
        let cache = Arc::new(
            hlsproxy::cache::ContentCache::open(&config.cache).expect("failed to open cache"),
        );

        let server =
            ProxyServer::with_parts(&config, cache, fetcher).expect("failed to build server");
        let addr = server.start().await.expect("failed to start server");

        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("failed to build client");

        Self {
            server,
            addr,
            origin: MockServer::start().await,
            cache_dir,
            client,
        }
    }

    /// Absolute origin URL for `path` on the mock origin.
    pub fn origin_url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.origin.uri(), path)).expect("invalid origin url")
    }

    /// Proxy URL for `path` on the mock origin.
    pub fn proxy_url(&self, path: &str) -> Url {
        self.server
            .encode_to_proxy_url(&self.origin_url(path))
            .expect("origin not encodable")
    }

    pub async fn get(&self, url: &Url) -> reqwest::Response {
        self.client
            .get(url.as_str())
            .send()
            .await
            .expect("request to proxy failed")
    }
}

/// Config bound to an ephemeral loopback port with the cache in `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        cache: CacheConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Fetcher double that serves one canned response and then fails.
pub struct OneShotFetcher {
    body: &'static [u8],
    content_type: Option<&'static str>,
    calls: AtomicUsize,
}

impl OneShotFetcher {
    pub fn new(body: &'static [u8], content_type: Option<&'static str>) -> Self {
        Self {
            body,
            content_type,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginFetcher for OneShotFetcher {
    async fn fetch(&self, url: &Url) -> hlsproxy_common::Result<FetchedResource> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(hlsproxy_common::Error::upstream(format!(
                "{} fetched more than once",
                url
            )));
        }
        Ok(FetchedResource {
            bytes: bytes::Bytes::from_static(self.body),
            content_type: self.content_type.map(str::to_string),
        })
    }
}
