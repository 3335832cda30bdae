//! Hlsproxy-Common: Shared types and utilities.
//!
//! This crate provides functionality used across hlsproxy:
//!
//! - **Cache keys**: SHA-256 content addresses derived from origin URLs
//! - **Resource types**: The streaming extension allow-list and MIME helpers
//! - **Error Handling**: The proxy error taxonomy and its HTTP status mapping
//!
//! # Examples
//!
//! ```
//! use hlsproxy_common::{CacheKey, Error, Result};
//! use hlsproxy_common::resource::is_streaming_extension;
//! use url::Url;
//!
//! let origin = Url::parse("https://cdn.example.com/live/index.m3u8").unwrap();
//! let key = CacheKey::for_url(&origin);
//! assert_eq!(key.as_str().len(), 64);
//!
//! assert!(is_streaming_extension("m3u8"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::upstream("connection refused"))
//! }
//! ```

pub mod error;
pub mod key;
pub mod resource;

pub use error::{Error, Result};
pub use key::CacheKey;
