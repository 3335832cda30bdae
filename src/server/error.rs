//! Error-to-HTTP response conversion.
//!
//! Proxy clients are media players, so error responses carry the status
//! code only. The detail goes to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: hlsproxy_common::Error,
}

impl AppError {
    pub fn new(inner: hlsproxy_common::Error) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &hlsproxy_common::Error {
        &self.inner
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<hlsproxy_common::Error> for AppError {
    fn from(e: hlsproxy_common::Error) -> Self {
        Self::new(e)
    }
}

impl From<hlsproxy_media::Error> for AppError {
    fn from(e: hlsproxy_media::Error) -> Self {
        Self::new(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.inner, "Proxy request failed");
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Rejected proxy request");
        }

        status.into_response()
    }
}
