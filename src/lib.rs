//! hlsproxy - loopback caching reverse proxy for HLS streams
//!
//! A player is pointed at `http://127.0.0.1:<port>/...?__hls_origin_url=...`
//! instead of the origin. The proxy fetches the origin once, keeps it in a
//! memory + disk cache, and rewrites manifests so every segment, key and
//! variant playlist is also requested through the proxy.
//!
//! This library crate exposes the core functionality for embedding and
//! integration testing.

pub mod cache;
pub mod config;
pub mod server;
pub mod upstream;

pub use server::ProxyServer;
