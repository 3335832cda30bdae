use crate::cache::{start_sweep_task, ContentCache};
use crate::config::Config;
use crate::upstream::{HttpFetcher, InflightFetches, OriginFetcher};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use hlsproxy_media::{encode_proxy_url, ProxyEndpoint};
use parking_lot::RwLock;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use url::Url;

pub mod error;
pub mod routes;

pub use error::AppError;

/// Shared request handler context
#[derive(Clone)]
pub struct ProxyState {
    pub cache: Arc<ContentCache>,
    pub fetcher: Arc<dyn OriginFetcher>,
    pub inflight: Arc<InflightFetches>,
    /// Address manifests are rewritten to point at
    endpoint: Arc<RwLock<ProxyEndpoint>>,
}

impl ProxyState {
    pub fn new(
        cache: Arc<ContentCache>,
        fetcher: Arc<dyn OriginFetcher>,
        endpoint: ProxyEndpoint,
    ) -> Self {
        Self {
            cache,
            fetcher,
            inflight: Arc::new(InflightFetches::new()),
            endpoint: Arc::new(RwLock::new(endpoint)),
        }
    }

    pub fn endpoint(&self) -> ProxyEndpoint {
        *self.endpoint.read()
    }

    fn set_endpoint(&self, endpoint: ProxyEndpoint) {
        *self.endpoint.write() = endpoint;
    }
}

/// Create the Axum router
///
/// Every path, the root included, goes to one GET handler; the resource is
/// named by the query string.
pub fn create_router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(routes::proxy_resource))
        .route("/*path", get(routes::proxy_resource))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    serve: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

/// Loopback HLS proxy with an explicit start/stop lifecycle.
pub struct ProxyServer {
    host: IpAddr,
    port: u16,
    sweep_interval: Duration,
    state: ProxyState,
    running: Mutex<Option<RunningServer>>,
    local_addr: RwLock<Option<SocketAddr>>,
}

impl ProxyServer {
    /// Build a server from configuration, opening the cache and HTTP client.
    pub fn new(config: &Config) -> Result<Self> {
        let cache = ContentCache::open(&config.cache).context("Failed to open content cache")?;
        let fetcher = HttpFetcher::new(&config.upstream);
        Self::with_parts(config, Arc::new(cache), Arc::new(fetcher))
    }

    /// Build a server around an existing cache and fetcher.
    pub fn with_parts(
        config: &Config,
        cache: Arc<ContentCache>,
        fetcher: Arc<dyn OriginFetcher>,
    ) -> Result<Self> {
        let host: IpAddr = config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid server host: {}", config.server.host))?;
        let port = config.server.port;

        Ok(Self {
            host,
            port,
            sweep_interval: config.cache.sweep_interval(),
            state: ProxyState::new(cache, fetcher, ProxyEndpoint::new(host, port)),
            running: Mutex::new(None),
            local_addr: RwLock::new(None),
        })
    }

    /// Bind and start serving. Returns the bound address.
    ///
    /// Calling this on a running server returns the existing address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            return Ok(server.addr);
        }

        let listener = tokio::net::TcpListener::bind(SocketAddr::new(self.host, self.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", self.host, self.port))?;
        let addr = listener.local_addr().context("Failed to read bound address")?;

        self.state.set_endpoint(ProxyEndpoint::from(addr));
        let app = create_router(self.state.clone());

        let (shutdown, shutdown_rx) = oneshot::channel();
        let serve = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Proxy server error: {}", e);
            }
        });
        let sweep = start_sweep_task(Arc::clone(&self.state.cache), self.sweep_interval);

        tracing::info!("Proxy server listening on {}", addr);

        *running = Some(RunningServer {
            addr,
            shutdown,
            serve,
            sweep,
        });
        *self.local_addr.write() = Some(addr);
        Ok(addr)
    }

    /// Stop serving and wait for in-flight requests to finish.
    ///
    /// A no-op when the server is not running.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            return;
        };
        *self.local_addr.write() = None;

        server.sweep.abort();
        let _ = server.shutdown.send(());
        if let Err(e) = server.serve.await {
            tracing::warn!("Proxy server task ended abnormally: {}", e);
        }

        tracing::info!("Proxy server on {} stopped", server.addr);
    }

    pub fn is_running(&self) -> bool {
        self.local_addr.read().is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    /// Proxy URL for `origin` at the server's current endpoint.
    ///
    /// `None` when the origin cannot be expressed as a proxy URL.
    pub fn encode_to_proxy_url(&self, origin: &Url) -> Option<Url> {
        match encode_proxy_url(origin, &self.state.endpoint()) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(origin = %origin, error = %e, "Cannot encode proxy URL");
                None
            }
        }
    }

    /// Empty both cache tiers.
    pub async fn clear_cache(&self) -> hlsproxy_common::Result<()> {
        self.state.cache.clear().await
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.state.cache
    }
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedResource;
    use crate::upstream::FetchedResource;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct StaticFetcher {
        body: &'static str,
        content_type: &'static str,
    }

    #[async_trait]
    impl OriginFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> hlsproxy_common::Result<FetchedResource> {
            Ok(FetchedResource {
                bytes: bytes::Bytes::from_static(self.body.as_bytes()),
                content_type: Some(self.content_type.to_string()),
            })
        }
    }

    fn state(dir: &TempDir, fetcher: StaticFetcher) -> ProxyState {
        let config = crate::config::CacheConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let cache = Arc::new(ContentCache::open(&config).unwrap());
        ProxyState::new(cache, Arc::new(fetcher), ProxyEndpoint::loopback(1234))
    }

    fn proxy_path(origin: &str) -> String {
        let url = encode_proxy_url(&Url::parse(origin).unwrap(), &ProxyEndpoint::loopback(1234))
            .unwrap();
        format!("{}?{}", url.path(), url.query().unwrap())
    }

    #[tokio::test]
    async fn test_segment_passthrough() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state(
            &dir,
            StaticFetcher {
                body: "segment",
                content_type: "application/octet-stream",
            },
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(proxy_path("https://cdn.example.com/v/seg1.m4s"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "video/iso.segment");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"segment");
    }

    #[tokio::test]
    async fn test_manifest_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state(
            &dir,
            StaticFetcher {
                body: "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n",
                content_type: "application/vnd.apple.mpegurl",
            },
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(proxy_path("https://cdn.example.com/v/index.m3u8"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXTINF:4.0,");
        let proxied = Url::parse(lines[2]).unwrap();
        assert_eq!(
            hlsproxy_media::decode_origin(proxied.query()).unwrap().as_str(),
            "https://cdn.example.com/v/seg1.ts"
        );
    }

    #[tokio::test]
    async fn test_missing_origin_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state(
            &dir,
            StaticFetcher {
                body: "",
                content_type: "video/mp2t",
            },
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/video.ts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_root_path_is_routed() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state(
            &dir,
            StaticFetcher {
                body: "root",
                content_type: "video/mp2t",
            },
        ));

        let proxied = proxy_path("https://cdn.example.com/v/seg1.ts");
        let query = proxied.split_once('?').unwrap().1;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/?{query}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"root");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_utf8_manifest_is_server_error() {
        let dir = TempDir::new().unwrap();
        let state = state(
            &dir,
            StaticFetcher {
                body: "",
                content_type: "video/mp2t",
            },
        );
        let origin = Url::parse("https://cdn.example.com/bad.m3u8").unwrap();
        let resource =
            CachedResource::new(vec![0xff, 0xfe, 0x00], origin.clone(), "application/x-mpegurl");
        state.cache.put(&resource.key(), resource).await;

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri(proxy_path(origin.as_str()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_post_is_not_allowed() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state(
            &dir,
            StaticFetcher {
                body: "",
                content_type: "video/mp2t",
            },
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(proxy_path("https://cdn.example.com/seg.ts"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

}
