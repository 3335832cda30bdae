//! Proxy URL codec.
//!
//! A proxy URL keeps the origin's path and query but points at the loopback
//! proxy, and carries the full origin URL in the [`ORIGIN_QUERY_KEY`] query
//! parameter. Only that parameter identifies the resource; the path is kept
//! so players that sniff the extension still see the right one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use hlsproxy_common::resource::{is_streaming_extension, path_extension};
use url::{form_urlencoded, Url};

use crate::error::{Error, Result};

/// Query parameter that carries the encoded origin URL.
pub const ORIGIN_QUERY_KEY: &str = "__hls_origin_url";

/// Address the proxy is reachable at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyEndpoint {
    host: IpAddr,
    port: u16,
}

impl ProxyEndpoint {
    /// Create an endpoint for an arbitrary host and port.
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    /// Create an endpoint on `127.0.0.1`.
    pub fn loopback(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Host the proxy is bound to.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Port the proxy is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn base_url(&self) -> Result<Url> {
        let base = format!("http://{}/", SocketAddr::new(self.host, self.port));
        Url::parse(&base).map_err(|e| Error::invalid_url(format!("{base}: {e}")))
    }
}

impl From<SocketAddr> for ProxyEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

/// Build the proxy URL for an origin URL.
///
/// Fails only when the origin has no path to copy (a cannot-be-a-base URL
/// such as `mailto:`).
///
/// # Examples
///
/// ```
/// use hlsproxy_media::{encode_proxy_url, ProxyEndpoint};
/// use url::Url;
///
/// let origin = Url::parse("https://cdn.example.com/live/index.m3u8?token=abc").unwrap();
/// let proxy = encode_proxy_url(&origin, &ProxyEndpoint::loopback(1234)).unwrap();
///
/// assert_eq!(proxy.scheme(), "http");
/// assert_eq!(proxy.host_str(), Some("127.0.0.1"));
/// assert_eq!(proxy.port(), Some(1234));
/// assert_eq!(proxy.path(), "/live/index.m3u8");
/// assert!(proxy.query().unwrap().starts_with("token=abc&__hls_origin_url="));
/// ```
pub fn encode_proxy_url(origin: &Url, endpoint: &ProxyEndpoint) -> Result<Url> {
    if origin.cannot_be_a_base() {
        return Err(Error::invalid_url(format!(
            "{origin} cannot be split into path components"
        )));
    }

    let mut proxy = endpoint.base_url()?;
    proxy.set_path(origin.path());
    proxy.set_query(origin.query());
    proxy
        .query_pairs_mut()
        .append_pair(ORIGIN_QUERY_KEY, origin.as_str());
    Ok(proxy)
}

/// Recover and validate the origin URL from a proxy request's query string.
///
/// The last occurrence of [`ORIGIN_QUERY_KEY`] wins, since encoding appends
/// it after the origin's own query items. The origin must be an absolute
/// `http`/`https` URL whose path extension is a streaming resource type.
pub fn decode_origin(query: Option<&str>) -> Result<Url> {
    let raw = query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .filter(|(key, _)| key == ORIGIN_QUERY_KEY)
                .map(|(_, value)| value.into_owned())
                .last()
        })
        .ok_or(Error::MissingOrigin)?;

    let origin = Url::parse(&raw).map_err(|e| Error::invalid_url(format!("{raw}: {e}")))?;

    if !matches!(origin.scheme(), "http" | "https") {
        return Err(Error::invalid_url(format!(
            "unsupported scheme {:?} in {origin}",
            origin.scheme()
        )));
    }
    if origin.host_str().is_none() {
        return Err(Error::invalid_url(format!("{origin} has no host")));
    }

    match path_extension(&origin) {
        Some(ext) if is_streaming_extension(ext) => Ok(origin),
        Some(ext) => Err(Error::UnsupportedResourceType(ext.to_string())),
        None => Err(Error::UnsupportedResourceType(format!(
            "no extension in {}",
            origin.path()
        ))),
    }
}

/// Recover the origin URL embedded in a full proxy URL.
pub fn origin_from_proxy_url(proxy: &Url) -> Result<Url> {
    decode_origin(proxy.query())
}
