//! Favicon HTTP handlers
//!
//! Thin wrappers over [`FaviconCoordinator`](crate::favicon::FaviconCoordinator):
//! validate the request, delegate, and map presence onto HTTP status codes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::favicon::{CASCADE_SIZES, DomainCache};
use crate::web::{
    AppState,
    responses::{bad_request, handle_error, handle_result, no_content, not_found, ok},
};

/// Cached favicons never change in place, so clients may keep them for 30 days
const FAVICON_CACHE_CONTROL: &str = "public, max-age=2592000";

#[derive(Debug, Deserialize)]
pub struct SizeQuery {
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearCacheQuery {
    pub domain: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    pub domains: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaviconUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailedStatusResponse {
    pub domain: String,
    pub failed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

fn required_url(query: UrlQuery) -> Result<String, Response> {
    match query.url.map(|u| u.trim().to_string()) {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(bad_request("Query parameter 'url' is required")),
    }
}

/// Serve the cached icon bytes for a domain, acquiring them on a miss
pub async fn get_favicon(
    Path(domain): Path<String>,
    Query(query): Query<SizeQuery>,
    State(state): State<AppState>,
) -> Response {
    if domain.trim().is_empty() {
        return bad_request("Domain must not be empty");
    }
    if let Some(size) = query.size
        && !CASCADE_SIZES.contains(&size)
    {
        return bad_request(&format!(
            "Unsupported size {size}; expected one of {CASCADE_SIZES:?}"
        ));
    }

    let Some(path) = state.coordinator.get_icon(&domain, query.size).await else {
        debug!("No favicon available for {}", domain);
        return handle_error(AppError::not_found("Favicon", domain));
    };

    let file_data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) => {
            return handle_error(AppError::internal(format!(
                "Failed to read cached favicon {}: {}",
                path.display(),
                e
            )));
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(DomainCache::content_type_for(&path)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(FAVICON_CACHE_CONTROL),
    );

    (headers, file_data).into_response()
}

/// Best candidate URL for a page, without caching it
pub async fn get_favicon_url(
    Query(query): Query<UrlQuery>,
    State(state): State<AppState>,
) -> Response {
    let url = match required_url(query) {
        Ok(url) => url,
        Err(response) => return response,
    };

    match state.coordinator.get_icon_url(&url).await {
        Some(icon_url) => ok(FaviconUrlResponse { url: icon_url }),
        None => not_found("Favicon", &url),
    }
}

/// Candidate list, scores and selection for a page
pub async fn inspect_favicons(
    Query(query): Query<UrlQuery>,
    State(state): State<AppState>,
) -> Response {
    let url = match required_url(query) {
        Ok(url) => url,
        Err(response) => return response,
    };
    ok(state.coordinator.extract(&url).await)
}

pub async fn get_failed_status(
    Path(domain): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let failed = state.coordinator.is_domain_marked_as_failed(&domain).await;
    ok(FailedStatusResponse { domain, failed })
}

pub async fn clear_failed_mark(
    Path(domain): Path<String>,
    State(state): State<AppState>,
) -> Response {
    state.coordinator.clear_failed_mark(&domain).await;
    no_content()
}

/// Remove cached files for one domain, the host of one URL, or everything
pub async fn clear_cache(
    Query(query): Query<ClearCacheQuery>,
    State(state): State<AppState>,
) -> Response {
    let coordinator = &state.coordinator;
    let result = match (query.domain.as_deref(), query.url.as_deref(), query.all) {
        (Some(domain), None, false) => coordinator.clear_cache_for_domain(domain).await,
        (None, Some(url), false) => coordinator.clear_cache_for_url(url).await,
        (None, None, true) => coordinator.clear_all_cache().await,
        _ => {
            return handle_error(AppError::validation(
                "Specify exactly one of 'domain', 'url' or 'all=true'",
            ));
        }
    };

    handle_result(
        result
            .map(|removed| ClearCacheResponse { removed })
            .map_err(AppError::from),
    )
}

/// Acquire icons for many domains at once
pub async fn reload_favicons(
    State(state): State<AppState>,
    Json(request): Json<ReloadRequest>,
) -> Response {
    if request.domains.iter().all(|d| d.trim().is_empty()) {
        return bad_request("At least one domain is required");
    }
    ok(state
        .coordinator
        .reload_batch(request.domains, request.force)
        .await)
}
