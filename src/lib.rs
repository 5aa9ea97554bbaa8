//! Favicon discovery, decoding and multi-resolution caching service
//!
//! The [`favicon`] module holds the engine; [`web`] exposes it over HTTP.

pub mod config;
pub mod errors;
pub mod favicon;
pub mod utils;
pub mod web;
