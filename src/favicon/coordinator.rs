//! Favicon acquisition orchestration
//!
//! The coordinator is the only public entry point the web layer needs. It
//! checks the filesystem cache, then the failure ledger, and only then runs
//! discovery, selection, download, decoding and the size cascade. Nothing
//! but the cache-clear operations reports an error to the caller; every
//! other outcome is a presence check.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::errors::{FaviconError, FaviconResult};
use crate::favicon::cascade::CascadeGenerator;
use crate::favicon::decoder::{DecodedIcon, IconDecoder};
use crate::favicon::discoverer::IconDiscoverer;
use crate::favicon::domain_cache::{CASCADE_SIZES, DomainCache};
use crate::favicon::failure_ledger::{FailureLedger, InMemoryTtlStore, TtlStore};
use crate::favicon::fetcher::{IconFetcher, IconHttpClient, ReqwestIconClient};
use crate::favicon::models::{ExtractionResult, FetchedIcon};
use crate::favicon::selector::IconSelector;
use crate::utils::url::UrlUtils;

/// Summary of a batch reload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReloadReport {
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub elapsed_ms: u64,
}

pub struct FaviconCoordinator {
    cache: DomainCache,
    ledger: FailureLedger,
    fetcher: IconFetcher,
    discoverer: IconDiscoverer,
    cascade: CascadeGenerator,
    domain_budget: Duration,
    batch_concurrency: usize,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FaviconCoordinator {
    pub fn new(
        config: &Config,
        client: Arc<dyn IconHttpClient>,
        store: Arc<dyn TtlStore>,
    ) -> Self {
        let cache = DomainCache::new(config.storage.favicon_cache_path.clone());
        let fetcher = IconFetcher::new(client, config.fetcher.max_icon_bytes);
        Self {
            ledger: FailureLedger::new(store, config.failure_cache.ttl),
            discoverer: IconDiscoverer::new(fetcher.clone()),
            cascade: CascadeGenerator::new(cache.clone()),
            cache,
            fetcher,
            domain_budget: config.coordinator.domain_budget,
            batch_concurrency: config.coordinator.batch_concurrency.max(1),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Production wiring: reqwest client and an in-process TTL store
    pub fn from_config(config: &Config) -> FaviconResult<Self> {
        let client = Arc::new(ReqwestIconClient::new(&config.fetcher)?);
        let store = Arc::new(InMemoryTtlStore::new());
        Ok(Self::new(config, client, store))
    }

    pub fn cache(&self) -> &DomainCache {
        &self.cache
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Cached icon path for `domain`, acquiring it on a miss
    pub async fn get_icon(&self, domain: &str, size: Option<u32>) -> Option<PathBuf> {
        self.get_icon_cancellable(domain, size, &CancellationToken::new())
            .await
    }

    /// [`Self::get_icon`] that stops when `cancel` fires, leaving neither a
    /// cache file nor a failure mark behind
    pub async fn get_icon_cancellable(
        &self,
        domain: &str,
        size: Option<u32>,
        cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        let Some(target) = UrlUtils::parse_domain_root(domain) else {
            warn!("Rejecting favicon lookup for invalid domain '{}'", domain);
            return None;
        };
        let host = UrlUtils::domain_key(&target)?;
        self.lookup(&host, target, size, cancel).await
    }

    /// Like [`Self::get_icon`] but discovers from the given page
    pub async fn get_icon_for_url(&self, url: &str, size: Option<u32>) -> Option<PathBuf> {
        let Some(target) = UrlUtils::parse_target(url) else {
            warn!("Rejecting favicon lookup for invalid URL '{}'", url);
            return None;
        };
        let host = UrlUtils::domain_key(&target)?;
        self.lookup(&host, target, size, &CancellationToken::new())
            .await
    }

    async fn lookup(
        &self,
        domain: &str,
        target: Url,
        size: Option<u32>,
        cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        if let Some(size) = size
            && !CASCADE_SIZES.contains(&size)
        {
            warn!("Rejecting favicon lookup for {} with unsupported size {}", domain, size);
            return None;
        }

        if let Some(path) = self.cached(domain, size).await {
            debug!("Favicon cache hit for {}: {}", domain, path.display());
            return Some(path);
        }
        if self.ledger.is_marked(domain).await {
            debug!("Skipping {}: recently failed", domain);
            return None;
        }

        let lock = self.domain_lock(domain).await;
        let guard = lock.clone().lock_owned().await;

        // another caller may have finished while we waited
        let result = match self.cached(domain, size).await {
            Some(path) => Some(path),
            None if self.ledger.is_marked(domain).await => None,
            None => self.acquire(domain, &target, size, cancel).await,
        };

        drop(guard);
        self.release_lock(domain, lock).await;
        result
    }

    async fn cached(&self, domain: &str, size: Option<u32>) -> Option<PathBuf> {
        match size {
            Some(size) => self.cache.lookup_closest(domain, size).await,
            None => self.cache.lookup_any_size(domain).await,
        }
    }

    async fn acquire(
        &self,
        domain: &str,
        target: &Url,
        size: Option<u32>,
        cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        let started = Instant::now();
        let download = tokio::select! {
            _ = cancel.cancelled() => Err(FaviconError::Cancelled { domain: domain.to_string() }),
            timed = tokio::time::timeout(self.domain_budget, self.download(target, size)) => {
                timed.unwrap_or_else(|_| Err(FaviconError::Timeout {
                    domain: domain.to_string(),
                    seconds: self.domain_budget.as_secs(),
                }))
            }
        };

        let result = match download {
            Ok(_) if cancel.is_cancelled() => Err(FaviconError::Cancelled {
                domain: domain.to_string(),
            }),
            Ok(icon) => self.persist(domain, size, &icon).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(path) => {
                info!(
                    "Cached favicon for {} at {} (took {:?})",
                    domain,
                    path.display(),
                    started.elapsed()
                );
                Some(path)
            }
            Err(e) if e.is_content_signal() => {
                warn!("Favicon acquisition failed for {}: {}", domain, e);
                self.ledger.mark(domain).await;
                None
            }
            Err(e) => {
                warn!("Favicon acquisition aborted for {}: {}", domain, e);
                None
            }
        }
    }

    /// Discover, rank and download, trying the next candidate on failure
    async fn download(&self, target: &Url, size: Option<u32>) -> FaviconResult<FetchedIcon> {
        let discovery = self.discoverer.discover(target).await;
        let ranked = match size {
            Some(size) => IconSelector::rank_for_size(&discovery.candidates, size),
            None => IconSelector::rank(&discovery.candidates),
        };
        debug!(
            "Trying {} ranked candidates for {} (base {})",
            ranked.len(),
            target,
            discovery.base_url
        );

        let mut last_error = FaviconError::invalid_content(target.as_str(), "no usable icon candidates");
        for candidate in &ranked {
            let Some(url) = candidate.source_url() else {
                continue;
            };
            match self.fetcher.try_fetch_icon(url).await {
                Ok(icon) => return Ok(icon),
                Err(e) => {
                    debug!("Candidate {} (score {}) failed: {}", url, candidate.score, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Decode and write the cascade, falling back to the raw bytes
    async fn persist(
        &self,
        domain: &str,
        size: Option<u32>,
        icon: &FetchedIcon,
    ) -> FaviconResult<PathBuf> {
        let extension =
            IconDecoder::detect_extension(&icon.url, icon.content_type.as_deref(), &icon.bytes);

        match IconDecoder::decode(&icon.bytes, &extension) {
            Ok(DecodedIcon::Vector(bytes)) => Ok(self
                .cache
                .store(domain, None, "svg", &bytes)
                .await?
                .into_path()),
            Ok(DecodedIcon::Raster(image)) => {
                let outcome = self.cascade.generate(domain, &image).await?;
                let requested = match size {
                    Some(size) => self.cache.lookup_exact_size(domain, size).await,
                    None => None,
                };
                match requested.or(outcome.representative) {
                    Some(path) => Ok(path),
                    None => {
                        debug!(
                            "{}x{} icon for {} is below the smallest size, keeping original",
                            image.width(),
                            image.height(),
                            domain
                        );
                        self.store_raw(domain, &extension, icon).await
                    }
                }
            }
            Err(e) => {
                debug!("Could not decode icon for {} ({}), keeping original", domain, e);
                self.store_raw(domain, &extension, icon).await
            }
        }
    }

    async fn store_raw(
        &self,
        domain: &str,
        extension: &str,
        icon: &FetchedIcon,
    ) -> FaviconResult<PathBuf> {
        Ok(self
            .cache
            .store(domain, None, extension, &icon.bytes)
            .await?
            .into_path())
    }

    async fn domain_lock(&self, domain: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.entry(domain.to_string()).or_default().clone()
    }

    async fn release_lock(&self, domain: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(domain)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            in_flight.remove(domain);
        }
    }

    /// Best candidate URL for a page without downloading it
    pub async fn get_icon_url(&self, url: &str) -> Option<String> {
        let target = UrlUtils::parse_target(url)?;
        let discovery =
            tokio::time::timeout(self.domain_budget, self.discoverer.discover(&target))
                .await
                .ok()?;
        IconSelector::select_best(&discovery.candidates)
            .and_then(|c| c.source_url().map(str::to_string))
    }

    /// Scored candidates and the selected best for a page
    pub async fn extract(&self, url: &str) -> ExtractionResult {
        let started = Instant::now();
        let Some(target) = UrlUtils::parse_target(url) else {
            return ExtractionResult {
                target_url: url.to_string(),
                domain: String::new(),
                candidates: Vec::new(),
                best: None,
                success: false,
                error: Some(format!("Invalid URL: '{url}'")),
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
        };
        let domain = UrlUtils::domain_key(&target).unwrap_or_default();

        let (candidates, error) =
            match tokio::time::timeout(self.domain_budget, self.discoverer.discover(&target)).await
            {
                Ok(discovery) => (discovery.candidates, None),
                Err(_) => (
                    Vec::new(),
                    Some(format!(
                        "Discovery timed out after {}",
                        humantime::format_duration(self.domain_budget)
                    )),
                ),
            };

        let mut candidates = candidates;
        IconSelector::score_all(&mut candidates);
        let best = IconSelector::select_best(&candidates);
        let error = match (&best, error) {
            (_, Some(e)) => Some(e),
            (None, None) => Some("No usable icon candidates found".to_string()),
            (Some(_), None) => None,
        };

        ExtractionResult {
            target_url: target.to_string(),
            domain,
            success: best.is_some(),
            candidates,
            best,
            error,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub async fn is_domain_marked_as_failed(&self, domain: &str) -> bool {
        match UrlUtils::extract_domain(domain) {
            Some(host) => self.ledger.is_marked(&host).await,
            None => false,
        }
    }

    pub async fn clear_failed_mark(&self, domain: &str) {
        if let Some(host) = UrlUtils::extract_domain(domain) {
            self.ledger.clear(&host).await;
        }
    }

    pub async fn clear_cache_for_url(&self, url: &str) -> FaviconResult<usize> {
        self.cache.clear_url(url).await
    }

    pub async fn clear_cache_for_domain(&self, domain: &str) -> FaviconResult<usize> {
        let host = UrlUtils::extract_domain(domain)
            .ok_or_else(|| FaviconError::invalid_input(format!("invalid domain '{domain}'")))?;
        self.cache.clear_domain(&host).await
    }

    pub async fn clear_all_cache(&self) -> FaviconResult<usize> {
        self.cache.clear_all().await
    }

    /// Ensure icons for many domains with bounded concurrency
    ///
    /// `force` clears failure marks first so recently failed domains are
    /// retried.
    pub async fn reload_batch(&self, domains: Vec<String>, force: bool) -> BatchReloadReport {
        let started = Instant::now();
        let mut seen = HashSet::new();
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && seen.insert(d.to_ascii_lowercase()))
            .collect();

        info!(
            "Reloading favicons for {} domains (concurrency {}, force {})",
            domains.len(),
            self.batch_concurrency,
            force
        );

        let results: Vec<(String, bool)> = stream::iter(domains)
            .map(|domain| async move {
                if force {
                    self.clear_failed_mark(&domain).await;
                }
                let ok = self.get_icon(&domain, None).await.is_some();
                (domain, ok)
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        let mut report = BatchReloadReport {
            total: results.len(),
            ..Default::default()
        };
        for (domain, ok) in results {
            if ok {
                report.succeeded.push(domain);
            } else {
                report.failed.push(domain);
            }
        }
        report.succeeded.sort();
        report.failed.sort();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Favicon reload finished: {} succeeded, {} failed in {}ms",
            report.succeeded.len(),
            report.failed.len(),
            report.elapsed_ms
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favicon::decoder::test_support::{ico_bytes, png_bytes};
    use crate::favicon::fetcher::test_support::ScriptedClient;
    use tempfile::TempDir;

    const PAGE: &str = "https://example.com/";

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.favicon_cache_path = dir.path().to_path_buf();
        config.coordinator.domain_budget = Duration::from_secs(5);
        config
    }

    fn coordinator(config: &Config, client: ScriptedClient) -> (FaviconCoordinator, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let coordinator =
            FaviconCoordinator::new(config, client.clone(), Arc::new(InMemoryTtlStore::new()));
        (coordinator, client)
    }

    fn site_with_png(size: u32) -> ScriptedClient {
        ScriptedClient::new()
            .html(PAGE, r#"<link rel="icon" href="/f.png">"#)
            .route(
                "https://example.com/f.png",
                200,
                Some("image/png"),
                png_bytes(size, size, [0, 128, 255, 255]),
            )
    }

    fn icon_gets(client: &ScriptedClient, url: &str) -> usize {
        client
            .requested()
            .iter()
            .filter(|r| *r == &format!("GET {url}"))
            .count()
    }

    #[tokio::test]
    async fn test_second_request_is_a_pure_cache_hit() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(&config(&dir), site_with_png(64));

        let first = coordinator.get_icon("example.com", None).await.unwrap();
        assert_eq!(first, dir.path().join("example_com_64.png"));
        let calls = client.total_calls();
        assert!(calls > 0);

        let second = coordinator.get_icon("example.com", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.total_calls(), calls);
        assert_eq!(icon_gets(&client, "https://example.com/f.png"), 1);
    }

    #[tokio::test]
    async fn test_sized_requests_use_cascade_then_closest() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(&config(&dir), site_with_png(64));

        let path = coordinator.get_icon("example.com", Some(32)).await.unwrap();
        assert_eq!(path, dir.path().join("example_com_32.png"));
        let calls = client.total_calls();

        let larger = coordinator.get_icon("example.com", Some(256)).await.unwrap();
        assert_eq!(larger, dir.path().join("example_com_64.png"));
        assert_eq!(client.total_calls(), calls);

        assert!(coordinator.get_icon("example.com", Some(48)).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_marked_and_suppresses_network() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(&config(&dir), ScriptedClient::new());

        assert!(coordinator.get_icon("example.com", None).await.is_none());
        assert!(coordinator.is_domain_marked_as_failed("example.com").await);
        let calls = client.total_calls();
        assert!(calls > 0);

        assert!(coordinator.get_icon("example.com", None).await.is_none());
        assert_eq!(client.total_calls(), calls);

        coordinator.clear_failed_mark("example.com").await;
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
        assert!(coordinator.get_icon("example.com", None).await.is_none());
        assert!(client.total_calls() > calls);
    }

    #[tokio::test]
    async fn test_failure_mark_expires() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.failure_cache.ttl = Duration::from_millis(50);
        let (coordinator, client) = coordinator(&config, ScriptedClient::new());

        assert!(coordinator.get_icon("example.com", None).await.is_none());
        let calls = client.total_calls();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
        assert!(coordinator.get_icon("example.com", None).await.is_none());
        assert!(client.total_calls() > calls);
    }

    #[tokio::test]
    async fn test_port_qualified_domain_keeps_its_origin() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new()
            .html("https://example.com:8443/", r#"<link rel="icon" href="/f.png">"#)
            .route(
                "https://example.com:8443/f.png",
                200,
                Some("image/png"),
                png_bytes(32, 32, [0, 128, 255, 255]),
            );
        let (coordinator, client) = coordinator(&config(&dir), client);

        let path = coordinator.get_icon("example.com:8443", None).await.unwrap();
        assert_eq!(path, dir.path().join("example_com_8443_32.png"));
        assert!(
            client
                .requested()
                .iter()
                .all(|r| r.contains("https://example.com:8443/"))
        );
        assert!(coordinator.cache().lookup_any_size("example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_port_qualified_failure_marks_only_that_origin() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(&config(&dir), site_with_png(32));

        assert!(coordinator.get_icon("http://example.com:8080", None).await.is_none());
        assert!(coordinator.is_domain_marked_as_failed("example.com:8080").await);
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
        assert!(
            client
                .requested()
                .iter()
                .all(|r| r.contains("http://example.com:8080/"))
        );

        assert!(coordinator.get_icon("example.com", None).await.is_some());
    }

    #[tokio::test]
    async fn test_blank_input_makes_no_calls_and_no_mark() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(&config(&dir), ScriptedClient::new());

        assert!(coordinator.get_icon("   ", None).await.is_none());
        assert!(coordinator.get_icon_for_url("", None).await.is_none());
        assert!(coordinator.get_icon("example.com", Some(20)).await.is_none());
        assert_eq!(client.total_calls(), 0);
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
    }

    #[tokio::test]
    async fn test_tiny_icon_keeps_original_bytes() {
        let dir = TempDir::new().unwrap();
        let original = png_bytes(15, 15, [1, 2, 3, 255]);
        let client = ScriptedClient::new()
            .html(PAGE, r#"<link rel="icon" href="/tiny.png">"#)
            .route("https://example.com/tiny.png", 200, Some("image/png"), original.clone());
        let (coordinator, _) = coordinator(&config(&dir), client);

        let path = coordinator.get_icon("example.com", None).await.unwrap();
        assert_eq!(path, dir.path().join("example_com.png"));
        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(coordinator.cache().lookup_exact_size("example.com", 16).await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_download_is_stored_raw() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new()
            .html(PAGE, r#"<link rel="icon" href="/broken.png">"#)
            .route("https://example.com/broken.png", 200, Some("image/png"), b"not an image".to_vec());
        let (coordinator, _) = coordinator(&config(&dir), client);

        let path = coordinator.get_icon("example.com", None).await.unwrap();
        assert_eq!(path, dir.path().join("example_com.png"));
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_candidate() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new()
            .html(
                PAGE,
                r#"<link rel="apple-touch-icon" href="/gone.png">
                   <link rel="shortcut icon" href="/favicon.ico">"#,
            )
            .route("https://example.com/gone.png", 404, None, Vec::<u8>::new())
            .route(
                "https://example.com/favicon.ico",
                200,
                Some("image/x-icon"),
                ico_bytes(&[(32, 32, png_bytes(32, 32, [9, 9, 9, 255]))]),
            );
        let (coordinator, _) = coordinator(&config(&dir), client);

        let path = coordinator.get_icon("example.com", None).await.unwrap();
        assert_eq!(path, dir.path().join("example_com_32.png"));
    }

    #[tokio::test]
    async fn test_svg_is_stored_verbatim() {
        let dir = TempDir::new().unwrap();
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#;
        let client = ScriptedClient::new()
            .html(
                PAGE,
                r#"<link rel="icon" href="/f.png" sizes="32x32">
                   <link rel="mask-icon" href="/mask.svg">"#,
            )
            .route("https://example.com/mask.svg", 200, Some("image/svg+xml"), svg.as_bytes().to_vec());
        let (coordinator, client) = coordinator(&config(&dir), client);

        let path = coordinator.get_icon("example.com", Some(64)).await.unwrap();
        assert_eq!(path, dir.path().join("example_com.svg"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), svg);
        assert_eq!(icon_gets(&client, "https://example.com/f.png"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_lookup_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(&config(&dir), site_with_png(32));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(
            coordinator
                .get_icon_cancellable("example.com", None, &cancel)
                .await
                .is_none()
        );
        assert!(!coordinator.is_domain_marked_as_failed("example.com").await);
        assert!(coordinator.cache().lookup_any_size("example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_marks_domain() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.coordinator.domain_budget = Duration::from_millis(50);
        let (coordinator, _) =
            coordinator(&config, site_with_png(32).with_delay(Duration::from_millis(200)));

        assert!(coordinator.get_icon("example.com", None).await.is_none());
        assert!(coordinator.is_domain_marked_as_failed("example.com").await);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        let dir = TempDir::new().unwrap();
        let (coordinator, client) = coordinator(
            &config(&dir),
            site_with_png(32).with_delay(Duration::from_millis(20)),
        );

        let (a, b) = tokio::join!(
            coordinator.get_icon("example.com", None),
            coordinator.get_icon("EXAMPLE.com", None)
        );
        assert_eq!(a, b);
        assert!(a.is_some());
        assert_eq!(icon_gets(&client, "https://example.com/f.png"), 1);
    }

    #[tokio::test]
    async fn test_extract_and_icon_url() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new()
            .html(
                PAGE,
                r##"<link rel="icon" href="/f.png" sizes="32x32">
                   <link rel="apple-touch-icon" href="/a.png">
                   <meta name="theme-color" content="#fff">"##,
            )
            .route("https://example.com/favicon.ico", 200, Some("image/x-icon"), vec![0u8]);
        let (coordinator, client) = coordinator(&config(&dir), client);

        let result = coordinator.extract("example.com").await;
        assert!(result.success);
        assert_eq!(result.domain, "example.com");
        assert_eq!(result.candidates.len(), 4);
        let best = result.best.unwrap();
        assert_eq!(best.source_url(), Some("https://example.com/f.png"));
        assert_eq!(best.score, 17);

        assert_eq!(
            coordinator.get_icon_url("https://example.com/").await.as_deref(),
            Some("https://example.com/f.png")
        );
        assert_eq!(icon_gets(&client, "https://example.com/f.png"), 0);

        let invalid = coordinator.extract("  ").await;
        assert!(!invalid.success);
        assert!(invalid.error.is_some());
    }

    #[tokio::test]
    async fn test_reload_batch_reports_per_domain() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(&config(&dir), site_with_png(32));

        coordinator.ledger().mark("example.com").await;
        let report = coordinator
            .reload_batch(
                vec!["example.com".into(), "missing.test".into(), "".into(), "Example.com".into()],
                false,
            )
            .await;
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, vec!["example.com", "missing.test"]);

        let report = coordinator
            .reload_batch(vec!["example.com".into()], true)
            .await;
        assert_eq!(report.succeeded, vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_clear_cache_operations() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(&config(&dir), site_with_png(32));

        assert!(coordinator.get_icon("example.com", None).await.is_some());
        assert_eq!(
            coordinator
                .clear_cache_for_url("https://example.com/some/page")
                .await
                .unwrap(),
            2
        );
        assert!(coordinator.get_icon("example.com", None).await.is_some());
        assert_eq!(coordinator.clear_cache_for_domain("example.com").await.unwrap(), 2);
        assert!(coordinator.clear_cache_for_domain(" ").await.is_err());
        assert_eq!(coordinator.clear_all_cache().await.unwrap(), 0);
    }
}
