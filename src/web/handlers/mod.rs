//! HTTP request handlers organized by resource

pub mod favicons;
pub mod health;
