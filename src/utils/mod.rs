//! Shared helpers used across the favicon engine and web layer

pub mod url;

pub use url::UrlUtils;
