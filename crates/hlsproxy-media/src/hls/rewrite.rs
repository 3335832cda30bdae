//! Line-oriented M3U8 rewriter.
//!
//! Manifests name the next fetchable resource in two ways: as a bare line
//! (segments, variant playlists) and as a quoted `URI="..."` attribute inside
//! a tag (`#EXT-X-KEY`, `#EXT-X-MAP`, `#EXT-X-MEDIA`, ...). Bare lines are
//! replaced whole; attributes are replaced in place. Anything that fails to
//! resolve is left exactly as it was.

use url::Url;

use crate::error::{Error, Result};
use crate::proxy_url::{encode_proxy_url, ProxyEndpoint};

/// Prefix shared by comments and tags.
const TAG_MARKER: char = '#';

/// Attribute carrying a reference inside a tag line.
const URI_ATTRIBUTE: &str = "URI=\"";

/// Result of rewriting a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Rewritten manifest text. Same line count and order as the input.
    pub text: String,
    /// Number of references replaced with proxy URLs.
    pub rewritten: usize,
    /// Number of references left untouched because they did not resolve.
    pub skipped: usize,
}

/// Rewrite every reference in `manifest` into a proxy URL.
///
/// `origin` is the URL the manifest was fetched from; relative references are
/// resolved against it. Lines are split on `\n` and a trailing `\r` is kept,
/// so CRLF manifests come back as CRLF.
pub fn rewrite_manifest(manifest: &str, origin: &Url, endpoint: &ProxyEndpoint) -> RewriteOutcome {
    let mut outcome = RewriteOutcome {
        text: String::with_capacity(manifest.len() * 2),
        ..Default::default()
    };

    for (index, raw) in manifest.split('\n').enumerate() {
        if index > 0 {
            outcome.text.push('\n');
        }

        let (line, line_end) = match raw.strip_suffix('\r') {
            Some(line) => (line, "\r"),
            None => (raw, ""),
        };

        match rewrite_line(line, origin, endpoint) {
            Ok(Some(rewritten)) => {
                outcome.rewritten += 1;
                outcome.text.push_str(&rewritten);
                outcome.text.push_str(line_end);
            }
            Ok(None) => outcome.text.push_str(raw),
            Err(e) => {
                tracing::debug!(line = index + 1, error = %e, "Leaving manifest line unchanged");
                outcome.skipped += 1;
                outcome.text.push_str(raw);
            }
        }
    }

    outcome
}

/// Rewrite one line. `Ok(None)` means the line holds no reference.
fn rewrite_line(line: &str, origin: &Url, endpoint: &ProxyEndpoint) -> Result<Option<String>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    if line.starts_with(TAG_MARKER) {
        return rewrite_tag(line, origin, endpoint);
    }

    let proxy = proxy_reference(line.trim(), origin, endpoint)?;
    Ok(Some(proxy.into()))
}

/// Replace the value of the first `URI="..."` attribute, leaving the rest of
/// the tag byte-identical.
fn rewrite_tag(line: &str, origin: &Url, endpoint: &ProxyEndpoint) -> Result<Option<String>> {
    let Some(attr_start) = line.find(URI_ATTRIBUTE) else {
        return Ok(None);
    };
    let value_start = attr_start + URI_ATTRIBUTE.len();
    let Some(value_len) = line[value_start..].find('"') else {
        return Ok(None);
    };
    let value_end = value_start + value_len;

    let proxy = proxy_reference(&line[value_start..value_end], origin, endpoint)?;

    let mut rewritten = String::with_capacity(line.len() + proxy.as_str().len());
    rewritten.push_str(&line[..value_start]);
    rewritten.push_str(proxy.as_str());
    rewritten.push_str(&line[value_end..]);
    Ok(Some(rewritten))
}

fn proxy_reference(reference: &str, origin: &Url, endpoint: &ProxyEndpoint) -> Result<Url> {
    let resolved = resolve_reference(reference, origin)?;
    encode_proxy_url(&resolved, endpoint)
}

/// Resolve a manifest reference against the manifest's origin URL.
///
/// - `http://` / `https://` references are used as-is.
/// - References starting with `/` are paths on the origin's host and port.
/// - Anything else is relative to the origin's directory, with `.` and `..`
///   segments normalized.
///
/// The origin must have a host.
///
/// # Examples
///
/// ```
/// use hlsproxy_media::resolve_reference;
/// use url::Url;
///
/// let origin = Url::parse("https://host/path/index.m3u8").unwrap();
/// assert_eq!(resolve_reference("seg1.ts", &origin).unwrap().as_str(), "https://host/path/seg1.ts");
/// assert_eq!(resolve_reference("../a/seg.ts", &origin).unwrap().as_str(), "https://host/a/seg.ts");
/// assert_eq!(resolve_reference("/root.ts", &origin).unwrap().as_str(), "https://host/root.ts");
/// ```
pub fn resolve_reference(reference: &str, origin: &Url) -> Result<Url> {
    if reference.is_empty() {
        return Err(Error::unresolvable(reference, "empty reference"));
    }

    if is_absolute_http(reference) {
        return Url::parse(reference).map_err(|e| Error::unresolvable(reference, e.to_string()));
    }

    if origin.cannot_be_a_base() || origin.host_str().is_none() {
        return Err(Error::unresolvable(
            reference,
            format!("origin {origin} has no host"),
        ));
    }

    if reference.starts_with('/') {
        return Ok(resolve_host_path(reference, origin));
    }

    // The "./" prefix stops segments like "a:b.ts" from parsing as a scheme.
    origin
        .join(&format!("./{reference}"))
        .map_err(|e| Error::unresolvable(reference, e.to_string()))
}

fn is_absolute_http(reference: &str) -> bool {
    let lower = reference
        .get(..8)
        .unwrap_or(reference)
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Place a root-relative path on the origin's scheme, host, and port.
fn resolve_host_path(reference: &str, origin: &Url) -> Url {
    let (rest, fragment) = match reference.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (reference, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut resolved = origin.clone();
    resolved.set_path(path);
    resolved.set_query(query);
    resolved.set_fragment(fragment);
    resolved
}
