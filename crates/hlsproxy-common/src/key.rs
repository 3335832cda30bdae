//! Content-addressed cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Length of a key's hex representation (SHA-256, 32 bytes).
pub const CACHE_KEY_LEN: usize = 64;

/// Cache key derived from an origin URL.
///
/// The key is the lowercase hex SHA-256 of the URL's absolute string. It keeps
/// on-disk file names short and free of path separators; it is not used for
/// any security decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an origin URL.
    #[must_use]
    pub fn for_url(origin: &Url) -> Self {
        Self::for_str(origin.as_str())
    }

    /// Derive the key for an already-serialized absolute URL string.
    #[must_use]
    pub fn for_str(absolute_url: &str) -> Self {
        let digest = Sha256::digest(absolute_url.as_bytes());
        Self(hex::encode(digest))
    }

    /// Parse a key from its hex form, e.g. a cache file name.
    ///
    /// Returns `None` unless the input is exactly 64 lowercase hex digits.
    pub fn from_hex(value: &str) -> Option<Self> {
        let valid = value.len() == CACHE_KEY_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    /// The key's hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_sha256_hex() {
        // sha256("abc")
        let key = CacheKey::for_str("abc");
        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let url = Url::parse("https://cdn.example.com/a/b/seg1.ts?token=1").unwrap();
        assert_eq!(CacheKey::for_url(&url), CacheKey::for_url(&url));
        assert_eq!(CacheKey::for_url(&url), CacheKey::for_str(url.as_str()));
    }

    #[test]
    fn test_distinct_urls_give_distinct_keys() {
        let a = Url::parse("https://cdn.example.com/seg1.ts").unwrap();
        let b = Url::parse("https://cdn.example.com/seg2.ts").unwrap();
        assert_ne!(CacheKey::for_url(&a), CacheKey::for_url(&b));
    }

    #[test]
    fn test_from_hex() {
        let key = CacheKey::for_str("https://example.com/index.m3u8");
        assert_eq!(CacheKey::from_hex(key.as_str()), Some(key));

        assert!(CacheKey::from_hex("short").is_none());
        assert!(CacheKey::from_hex(&"G".repeat(64)).is_none());
        assert!(CacheKey::from_hex(&"A".repeat(64)).is_none());
        assert!(CacheKey::from_hex(&format!("{}.tmp", "a".repeat(60))).is_none());
    }
}
