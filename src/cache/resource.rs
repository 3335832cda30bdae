use bytes::Bytes;
use hlsproxy_common::CacheKey;
use url::Url;

/// A fetched origin resource as held by the cache.
///
/// Immutable once built; clones share the byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResource {
    bytes: Bytes,
    source_url: Url,
    mime_type: String,
}

impl CachedResource {
    pub fn new(bytes: impl Into<Bytes>, source_url: Url, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            source_url,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Key this resource is stored under.
    pub fn key(&self) -> CacheKey {
        CacheKey::for_url(&self.source_url)
    }

    /// Memory-tier cost: the body length in bytes.
    pub fn cost(&self) -> usize {
        self.bytes.len()
    }
}
