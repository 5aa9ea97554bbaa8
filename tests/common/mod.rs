//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use favicon_cache::config::Config;
use favicon_cache::errors::{FaviconError, FaviconResult};
use favicon_cache::favicon::{
    FaviconCoordinator, HeadResponse, HttpResponse, IconHttpClient, InMemoryTtlStore,
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// In-memory web: exact URL -> (status, content type, body)
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, (u16, Option<String>, Bytes)>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            (200, Some("text/html".into()), Bytes::from(html.to_string())),
        );
        self
    }

    pub fn file(mut self, url: &str, content_type: &str, body: Vec<u8>) -> Self {
        self.pages
            .insert(url.to_string(), (200, Some(content_type.into()), Bytes::from(body)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn gets_of(&self, url: &str) -> usize {
        let needle = format!("GET {url}");
        self.log.lock().unwrap().iter().filter(|l| **l == needle).count()
    }

    fn record(&self, method: &str, url: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("{method} {url}"));
    }
}

#[async_trait]
impl IconHttpClient for FakeWeb {
    async fn get(&self, url: &str, max_bytes: usize) -> FaviconResult<HttpResponse> {
        self.record("GET", url);
        let (status, content_type, body) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| FaviconError::network(url, "connection refused"))?;
        if body.len() > max_bytes {
            return Err(FaviconError::invalid_content(url, "too large"));
        }
        Ok(HttpResponse {
            final_url: url.to_string(),
            status,
            content_type,
            body,
        })
    }

    async fn head(&self, url: &str) -> FaviconResult<HeadResponse> {
        self.record("HEAD", url);
        let (status, content_type, _) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| FaviconError::network(url, "connection refused"))?;
        Ok(HeadResponse {
            final_url: url.to_string(),
            status,
            content_type,
        })
    }
}

pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba(rgba)));
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// ICO container holding PNG payloads, one per `(width, height, payload)`
pub fn ico(entries: &[(u8, u8, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());

    let mut offset = 6 + 16 * entries.len() as u32;
    for (width, height, payload) in entries {
        out.push(*width);
        out.push(*height);
        out.push(0);
        out.push(0);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&32u16.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        offset += payload.len() as u32;
    }
    for (_, _, payload) in entries {
        out.extend_from_slice(payload);
    }
    out
}

pub struct Harness {
    pub dir: TempDir,
    pub web: Arc<FakeWeb>,
    pub coordinator: Arc<FaviconCoordinator>,
}

pub fn harness(web: FakeWeb) -> Harness {
    harness_with(web, |_| {})
}

pub fn harness_with(web: FakeWeb, tweak: impl FnOnce(&mut Config)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.favicon_cache_path = dir.path().to_path_buf();
    config.coordinator.domain_budget = Duration::from_secs(5);
    tweak(&mut config);

    let web = Arc::new(web);
    let coordinator = Arc::new(FaviconCoordinator::new(
        &config,
        web.clone(),
        Arc::new(InMemoryTtlStore::new()),
    ));
    Harness {
        dir,
        web,
        coordinator,
    }
}
