//! Hlsproxy-Media: proxy URL codec and HLS manifest rewriting
//!
//! This crate holds the protocol half of hlsproxy. It has no I/O: given an
//! origin URL and the proxy's loopback endpoint it produces proxy URLs, and
//! given a manifest body it rewrites every reference so the player comes back
//! through the proxy for the next fetch.
//!
//! # Modules
//!
//! - `proxy_url` - Embed an origin URL in a proxy URL and recover it
//! - `hls` - Line-oriented M3U8 rewriting and reference resolution
//!
//! # Example
//!
//! ```
//! use hlsproxy_media::{rewrite_manifest, ProxyEndpoint};
//! use url::Url;
//!
//! let endpoint = ProxyEndpoint::loopback(1234);
//! let origin = Url::parse("https://cdn.example.com/live/index.m3u8").unwrap();
//! let manifest = "#EXTM3U\n#EXTINF:6.0,\nseg1.ts\n";
//!
//! let rewritten = rewrite_manifest(manifest, &origin, &endpoint);
//! assert!(rewritten.text.lines().nth(2).unwrap().starts_with("http://127.0.0.1:1234/live/seg1.ts?"));
//! ```

pub mod error;
pub mod hls;
pub mod proxy_url;

pub use error::{Error, Result};
pub use hls::{resolve_reference, rewrite_manifest, RewriteOutcome};
pub use proxy_url::{decode_origin, encode_proxy_url, ProxyEndpoint, ORIGIN_QUERY_KEY};
