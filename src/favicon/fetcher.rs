//! Outbound HTTP for page discovery and icon downloads
//!
//! All requests go through the [`IconHttpClient`] seam. The production
//! implementation is [`ReqwestIconClient`], built once from
//! [`FetcherConfig`] and shared by the coordinator.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::FetcherConfig;
use crate::errors::{FaviconError, FaviconResult};
use crate::favicon::models::FetchedIcon;
use crate::utils::url::UrlUtils;

/// Upper bound for an HTML page read during discovery
pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// Response to a GET; `body` is empty for non-2xx statuses
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HeadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface needed by discovery and fetching
///
/// Implementations follow redirects and report the final URL. Bodies larger
/// than `max_bytes` must be rejected rather than truncated.
#[async_trait]
pub trait IconHttpClient: Send + Sync {
    async fn get(&self, url: &str, max_bytes: usize) -> FaviconResult<HttpResponse>;
    async fn head(&self, url: &str) -> FaviconResult<HeadResponse>;
}

/// reqwest backed [`IconHttpClient`]
#[derive(Clone)]
pub struct ReqwestIconClient {
    client: reqwest::Client,
}

impl ReqwestIconClient {
    pub fn new(config: &FetcherConfig) -> FaviconResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.request_deadline())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| FaviconError::Configuration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        debug!(
            "Created icon HTTP client (connect {:?}, read {:?}, deadline {:?}, max redirects {})",
            config.connect_timeout,
            config.read_timeout,
            config.request_deadline(),
            config.max_redirects
        );
        Ok(Self { client })
    }

    fn content_type(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }
}

#[async_trait]
impl IconHttpClient for ReqwestIconClient {
    async fn get(&self, url: &str, max_bytes: usize) -> FaviconResult<HttpResponse> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FaviconError::network(url, e.to_string()))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = Self::content_type(&response);

        if !response.status().is_success() {
            return Ok(HttpResponse {
                final_url,
                status,
                content_type,
                body: Bytes::new(),
            });
        }

        if let Some(length) = response.content_length()
            && length > max_bytes as u64
        {
            return Err(FaviconError::invalid_content(
                url,
                format!("response of {length} bytes exceeds limit of {max_bytes}"),
            ));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FaviconError::network(url, format!("Failed to read response body: {e}")))?
        {
            if body.len() + chunk.len() > max_bytes {
                return Err(FaviconError::invalid_content(
                    url,
                    format!("response exceeds limit of {max_bytes} bytes"),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            final_url,
            status,
            content_type,
            body: body.freeze(),
        })
    }

    async fn head(&self, url: &str) -> FaviconResult<HeadResponse> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| FaviconError::network(url, e.to_string()))?;

        Ok(HeadResponse {
            final_url: response.url().to_string(),
            status: response.status().as_u16(),
            content_type: Self::content_type(&response),
        })
    }
}

/// Validating wrapper over an [`IconHttpClient`]
#[derive(Clone)]
pub struct IconFetcher {
    client: Arc<dyn IconHttpClient>,
    max_icon_bytes: usize,
}

impl IconFetcher {
    pub fn new(client: Arc<dyn IconHttpClient>, max_icon_bytes: usize) -> Self {
        Self {
            client,
            max_icon_bytes,
        }
    }

    /// Origin of the URL a HEAD request ends up at, or of `target` itself
    /// when the HEAD fails
    pub async fn resolve_base(&self, target: &Url) -> String {
        match self.client.head(target.as_str()).await {
            Ok(response) => match Url::parse(&response.final_url) {
                Ok(final_url) if final_url.host_str().is_some() => {
                    if final_url.as_str() != target.as_str() {
                        debug!("Resolved {} to {}", target, final_url);
                    }
                    UrlUtils::origin(&final_url)
                }
                _ => UrlUtils::origin(target),
            },
            Err(e) => {
                debug!("HEAD failed for {}, using request origin: {}", target, e);
                UrlUtils::origin(target)
            }
        }
    }

    /// HTML of a page, `None` on any failure
    pub async fn fetch_page(&self, url: &str) -> Option<String> {
        match self.client.get(url, MAX_PAGE_BYTES).await {
            Ok(response) if response.is_success() => {
                trace!("Fetched page {} ({} bytes)", url, response.body.len());
                Some(String::from_utf8_lossy(&response.body).into_owned())
            }
            Ok(response) => {
                debug!("Page fetch for {} returned HTTP {}", url, response.status);
                None
            }
            Err(e) => {
                debug!("Page fetch failed for {}: {}", url, e);
                None
            }
        }
    }

    /// Whether a HEAD request for `url` succeeds
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                trace!("Probe failed for {}: {}", url, e);
                false
            }
        }
    }

    pub async fn fetch_icon(&self, url: &str) -> Option<FetchedIcon> {
        match self.try_fetch_icon(url).await {
            Ok(icon) => Some(icon),
            Err(e) => {
                warn!("Icon fetch failed: {} - {}", UrlUtils::obfuscate_credentials(url), e);
                None
            }
        }
    }

    /// Download `url` and check that the response looks like an icon
    pub async fn try_fetch_icon(&self, url: &str) -> FaviconResult<FetchedIcon> {
        debug!("Attempting to fetch icon: {}", UrlUtils::obfuscate_credentials(url));
        let response = self.client.get(url, self.max_icon_bytes).await?;

        if !response.is_success() {
            return Err(FaviconError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        if !Self::acceptable(url, &response) {
            return Err(FaviconError::invalid_content(
                url,
                format!(
                    "content type {:?} is not an image",
                    response.content_type.as_deref().unwrap_or("none")
                ),
            ));
        }

        if response.body.is_empty() {
            return Err(FaviconError::invalid_content(url, "empty body"));
        }
        if response.body.len() > self.max_icon_bytes {
            return Err(FaviconError::invalid_content(
                url,
                format!("icon exceeds limit of {} bytes", self.max_icon_bytes),
            ));
        }

        debug!(
            "Successfully fetched icon: {} ({} bytes)",
            response.final_url,
            response.body.len()
        );
        Ok(FetchedIcon {
            url: response.final_url,
            content_type: response.content_type,
            bytes: response.body,
        })
    }

    fn acceptable(url: &str, response: &HttpResponse) -> bool {
        let image_type = response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("image"));
        let icon_suffix = |u: &str| UrlUtils::has_extension(u, "svg") || UrlUtils::has_extension(u, "ico");
        image_type || icon_suffix(url) || icon_suffix(&response.final_url)
    }
}
