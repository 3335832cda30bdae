//! Resource-type helpers keyed on URL path extensions and MIME types.
//!
//! The proxy only relays streaming resources. The allow-list here is what
//! keeps it from becoming an open fetch relay.

use url::Url;

/// Path extensions the proxy will fetch.
const STREAMING_EXTENSIONS: &[&str] = &["m3u8", "ts", "mp4", "m4s", "m4a", "m4v"];

/// MIME types that identify an HLS manifest.
const MANIFEST_MIME_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// Server-declared types too generic to describe a media container.
const GENERIC_MIME_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "text/plain",
];

/// MIME type served for HLS manifests.
pub const MANIFEST_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Extension of the final path segment of a URL, if any.
///
/// # Examples
///
/// ```
/// use hlsproxy_common::resource::path_extension;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/live/seg1.ts?x=1").unwrap();
/// assert_eq!(path_extension(&url), Some("ts"));
/// ```
pub fn path_extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Check if an extension is in the streaming allow-list (case-insensitive).
pub fn is_streaming_extension(ext: &str) -> bool {
    STREAMING_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

/// Get the streaming extension allow-list.
#[must_use]
pub fn streaming_extensions() -> &'static [&'static str] {
    STREAMING_EXTENSIONS
}

/// Check if a resource is an HLS manifest, by declared MIME type or by the
/// `.m3u8` extension of its origin.
pub fn is_manifest(origin: &Url, mime_type: &str) -> bool {
    let essence = mime_essence(mime_type);
    MANIFEST_MIME_TYPES
        .iter()
        .any(|m| m.eq_ignore_ascii_case(essence))
        || path_extension(origin).is_some_and(|ext| ext.eq_ignore_ascii_case("m3u8"))
}

/// Container MIME type implied by an extension, for media containers only.
pub fn container_mime_type(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "m4s" => Some("video/iso.segment"),
        "m4a" => Some("audio/mp4"),
        "m4v" => Some("video/x-m4v"),
        "ts" => Some("video/mp2t"),
        _ => None,
    }
}

/// Extract the `type/subtype` part of a `Content-Type` value.
///
/// Returns an empty string when the header carries no type.
pub fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
}

/// Pick the MIME type to store for a fetched resource.
///
/// `.mp4` origins are always `video/mp4`, whatever the server declared; the
/// player depends on it. Other containers only replace a generic declared
/// type. Returns `None` when there is no usable type at all.
pub fn normalize_mime_type(origin: &Url, declared: Option<&str>) -> Option<String> {
    let declared = declared.map(mime_essence).filter(|m| !m.is_empty());
    let container = path_extension(origin).and_then(container_mime_type);

    match (declared, container) {
        (_, Some("video/mp4")) => Some("video/mp4".to_string()),
        (Some(declared), Some(container))
            if GENERIC_MIME_TYPES
                .iter()
                .any(|g| g.eq_ignore_ascii_case(declared)) =>
        {
            Some(container.to_string())
        }
        (Some(declared), _) => Some(declared.to_string()),
        (None, _) => None,
    }
}
