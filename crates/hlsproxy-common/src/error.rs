//! Common error types used throughout hlsproxy.
//!
//! Every failure the proxy can hit while serving a request maps onto one of
//! these variants. [`Error::http_status`] decides what the player sees.

/// Common error type for hlsproxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request carried no origin query parameter.
    #[error("Missing origin URL parameter")]
    MissingOrigin,

    /// The origin parameter could not be decoded or parsed as a URL.
    #[error("Invalid origin URL: {0}")]
    InvalidOriginUrl(String),

    /// The origin's path extension is outside the streaming allow-list.
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    /// The origin could not be fetched or returned an unusable response.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// A manifest body could not be read as text.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// A cache tier could not be read or written.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new InvalidOriginUrl error.
    pub fn invalid_origin<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOriginUrl(msg.into())
    }

    /// Create a new UnsupportedResourceType error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedResourceType(msg.into())
    }

    /// Create a new UpstreamFetch error.
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamFetch(msg.into())
    }

    /// Create a new InvalidManifest error.
    pub fn invalid_manifest<S: Into<String>>(msg: S) -> Self {
        Self::InvalidManifest(msg.into())
    }

    /// Create a new CacheUnavailable error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::CacheUnavailable(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code returned to the player for this error.
    ///
    /// Origin problems are the client's fault and are never retried by the
    /// proxy; everything else is a server error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingOrigin | Self::InvalidOriginUrl(_) | Self::UnsupportedResourceType(_) => {
                400
            }
            Self::UpstreamFetch(_)
            | Self::InvalidManifest(_)
            | Self::CacheUnavailable(_)
            | Self::Io(_)
            | Self::Internal(_) => 500,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
