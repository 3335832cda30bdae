//! HLS manifest rewriting.
//!
//! This module rewrites M3U8 manifests so that every segment, key, map, and
//! variant reference points back at the proxy.

mod rewrite;

pub use rewrite::{resolve_reference, rewrite_manifest, RewriteOutcome};
