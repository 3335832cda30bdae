//! Error types for hlsproxy-media.

use thiserror::Error;

/// Result type for hlsproxy-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hlsproxy-media operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The origin parameter is absent from the proxy request.
    #[error("Missing origin parameter")]
    MissingOrigin,

    /// A URL could not be parsed, decomposed, or is not an http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The origin path extension is not a streaming resource type.
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    /// A manifest reference could not be resolved against its origin.
    #[error("Unresolvable reference {reference:?}: {reason}")]
    UnresolvableReference { reference: String, reason: String },
}

impl Error {
    /// Create an invalid URL error.
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    /// Create an unresolvable reference error.
    pub fn unresolvable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

impl From<Error> for hlsproxy_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingOrigin => Self::MissingOrigin,
            Error::InvalidUrl(msg) => Self::InvalidOriginUrl(msg),
            Error::UnsupportedResourceType(ext) => Self::UnsupportedResourceType(ext),
            other @ Error::UnresolvableReference { .. } => Self::InvalidOriginUrl(other.to_string()),
        }
    }
}
