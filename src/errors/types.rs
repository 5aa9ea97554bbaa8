//! Error type definitions for the favicon cache service
//!
//! The favicon engine reports failures through [`FaviconError`]. Components
//! convert these into `Option`/`bool` at their boundaries; the web layer wraps
//! what remains in [`AppError`] and maps it onto HTTP status codes.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Favicon engine errors
    #[error("Favicon error: {0}")]
    Favicon(#[from] FaviconError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised inside the favicon discovery, decoding and caching pipeline
#[derive(Error, Debug)]
pub enum FaviconError {
    /// Blank or unparseable domain/URL. Never recorded as a failure mark.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Transport failures: DNS, refused connections, TLS, body read errors
    #[error("Network error: {url} - {message}")]
    Network { url: String, message: String },

    /// Non-2xx responses
    #[error("HTTP error: {status} - {url}")]
    HttpStatus { status: u16, url: String },

    /// Response was successful but is not an icon we accept
    #[error("Invalid content from {url}: {message}")]
    InvalidContent { url: String, message: String },

    /// ICO header, directory or embedded DIB failed validation
    #[error("Malformed icon container: {message}")]
    MalformedContainer { message: String },

    /// No decode strategy produced an image
    #[error("Unsupported image: {message}")]
    UnsupportedImage { message: String },

    /// Filesystem cache failures
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Failed to encode a resized variant
    #[error("Encode error: {0}")]
    Encode(#[from] image::ImageError),

    /// Per-domain time budget exhausted
    #[error("Timed out after {seconds}s: {domain}")]
    Timeout { domain: String, seconds: u64 },

    /// Lookup was cancelled by the caller
    #[error("Cancelled: {domain}")]
    Cancelled { domain: String },

    /// Failure ledger backing store errors
    #[error("TTL store error: {message}")]
    TtlStore { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl FaviconError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn invalid_content<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidContent {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedContainer {
            message: message.into(),
        }
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedImage {
            message: message.into(),
        }
    }

    pub fn ttl_store<S: Into<String>>(message: S) -> Self {
        Self::TtlStore {
            message: message.into(),
        }
    }

    /// Whether this failure says something about the remote domain.
    ///
    /// Invalid input, cancellation and local storage problems are not
    /// evidence that a domain is unreachable and must not be recorded in the
    /// failure ledger.
    pub fn is_content_signal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidInput { .. }
                | Self::Cancelled { .. }
                | Self::Storage(_)
                | Self::Encode(_)
                | Self::TtlStore { .. }
                | Self::Configuration { .. }
        )
    }
}
