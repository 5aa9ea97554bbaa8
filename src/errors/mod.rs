//! Centralized error handling for the favicon cache service
//!
//! This module provides the error types shared by the favicon engine and the
//! web layer that fronts it.
//!
//! # Error Categories
//!
//! - **Input Errors**: blank or unparseable domains and URLs
//! - **Network Errors**: timeouts, refused connections, non-2xx responses
//! - **Decode Errors**: malformed ICO containers and unsupported images
//! - **Storage Errors**: filesystem cache failures
//!
//! # Usage
//!
//! ```rust
//! use favicon_cache::errors::{FaviconError, FaviconResult};
//!
//! fn example_function(domain: &str) -> FaviconResult<String> {
//!     if domain.trim().is_empty() {
//!         return Err(FaviconError::invalid_input("domain is blank"));
//!     }
//!     Ok(domain.to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for favicon engine Results
pub type FaviconResult<T> = Result<T, FaviconError>;
