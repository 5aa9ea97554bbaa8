//! HTTP response types and utilities
//!
//! Every JSON endpoint wraps its payload in [`ApiResponse`] so clients see one
//! envelope shape for successes and failures alike.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{AppError, AppResult, FaviconError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: HashMap<String, String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: Some(details),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Helper function to convert AppResult to HTTP response
pub fn handle_result<T>(result: AppResult<T>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(error) => handle_error(error),
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message, details) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::NotFound { resource, id } => (
            StatusCode::NOT_FOUND,
            format!("{} with id '{}' not found", resource, id),
            None,
        ),
        AppError::Favicon(favicon_error) => favicon_status(favicon_error),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", message),
            None,
        ),
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Request rejected: {}", error);
    }

    let response = match details {
        Some(details) => ApiResponse::<()>::error_with_details(message, details),
        None => ApiResponse::<()>::error(message),
    };
    (status, Json(response)).into_response()
}

fn favicon_status(error: &FaviconError) -> (StatusCode, String, Option<HashMap<String, String>>) {
    match error {
        FaviconError::InvalidInput { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        FaviconError::Network { url, .. } | FaviconError::HttpStatus { url, .. } => {
            let mut details = HashMap::new();
            details.insert("url".to_string(), url.clone());
            (
                StatusCode::BAD_GATEWAY,
                "Upstream request failed".to_string(),
                Some(details),
            )
        }
        FaviconError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, error.to_string(), None),
        FaviconError::InvalidContent { .. }
        | FaviconError::MalformedContainer { .. }
        | FaviconError::UnsupportedImage { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, error.to_string(), None)
        }
        FaviconError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Favicon cache storage failed".to_string(),
            None,
        ),
        FaviconError::Encode(_)
        | FaviconError::Cancelled { .. }
        | FaviconError::TtlStore { .. }
        | FaviconError::Configuration { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string(), None)
        }
    }
}

/// Success response helpers
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Error response helpers
pub fn bad_request(message: &str) -> Response {
    handle_error(AppError::validation(message))
}

pub fn not_found(resource: &str, id: &str) -> Response {
    handle_error(AppError::not_found(resource, id))
}

/// Health check payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub cache_path: String,
}

impl HealthResponse {
    pub fn healthy(cache_path: String) -> Self {
        Self {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cache_path,
        }
    }
}
