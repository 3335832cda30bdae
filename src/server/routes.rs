//! The proxy route.
//!
//! Every request is identified solely by its `__hls_origin_url` query
//! parameter; the path is ignored.

use axum::extract::{RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use hlsproxy_common::resource::{is_manifest, normalize_mime_type};
use hlsproxy_common::{CacheKey, Error};
use hlsproxy_media::{decode_origin, rewrite_manifest};
use url::Url;

use super::error::AppError;
use super::ProxyState;
use crate::cache::CachedResource;

/// `GET /*path?__hls_origin_url=...`
pub async fn proxy_resource(
    State(state): State<ProxyState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let origin = decode_origin(query.as_deref())?;
    let key = CacheKey::for_url(&origin);

    let resource = match state.cache.get(&key).await {
        Some(resource) => resource,
        None => fetch_and_store(&state, &origin, key).await?,
    };

    respond(&state, &origin, &resource)
}

/// Fetch `origin` and cache it.
///
/// Runs in its own task so a client hanging up does not abort the fetch or
/// the cache write. Concurrent misses for the same key wait on one gate and
/// re-check the cache before fetching.
async fn fetch_and_store(
    state: &ProxyState,
    origin: &Url,
    key: CacheKey,
) -> Result<CachedResource, AppError> {
    let state = state.clone();
    let origin = origin.clone();

    let task = tokio::spawn(async move {
        let _gate = state.inflight.acquire(&key).await;
        if let Some(resource) = state.cache.get(&key).await {
            return Ok(resource);
        }

        let fetched = state.fetcher.fetch(&origin).await?;
        let mime_type = normalize_mime_type(&origin, fetched.content_type.as_deref())
            .ok_or_else(|| Error::upstream(format!("{} has no usable content type", origin)))?;

        let resource = CachedResource::new(fetched.bytes, origin, mime_type);
        state.cache.put(&key, resource.clone()).await;
        Ok::<_, Error>(resource)
    });

    let resource = task
        .await
        .map_err(|e| Error::internal(format!("fetch task failed: {}", e)))??;
    Ok(resource)
}

fn respond(
    state: &ProxyState,
    origin: &Url,
    resource: &CachedResource,
) -> Result<Response, AppError> {
    let content_type = HeaderValue::from_str(resource.mime_type())
        .map_err(|e| Error::internal(format!("invalid stored MIME type: {}", e)))?;

    let body = if is_manifest(origin, resource.mime_type()) {
        let text = std::str::from_utf8(resource.bytes())
            .map_err(|e| Error::invalid_manifest(format!("{}: {}", origin, e)))?;
        let outcome = rewrite_manifest(text, origin, &state.endpoint());
        tracing::debug!(
            origin = %origin,
            rewritten = outcome.rewritten,
            skipped = outcome.skipped,
            "Rewrote manifest"
        );
        Bytes::from(outcome.text)
    } else {
        resource.bytes().clone()
    };

    Ok(([(CONTENT_TYPE, content_type)], body).into_response())
}
