//! Negative cache recording domains whose favicon acquisition recently failed

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::FaviconResult;
use crate::favicon::domain_cache::DomainCache;

const KEY_PREFIX: &str = "favicon:failed:";

/// Key-value store with per-entry expiry
///
/// Implementations may be backed by an external cache service; the crate
/// ships [`InMemoryTtlStore`].
#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> FaviconResult<()>;
    async fn exists(&self, key: &str) -> FaviconResult<bool>;
    async fn delete(&self, key: &str) -> FaviconResult<()>;

    /// Drop expired entries, returning how many were removed
    ///
    /// Stores that expire entries on their own keep the default.
    async fn purge_expired(&self) -> FaviconResult<usize> {
        Ok(0)
    }
}

/// Process-local [`TtlStore`] with lazy expiry
#[derive(Debug, Default)]
pub struct InMemoryTtlStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryTtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TtlStore for InMemoryTtlStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> FaviconResult<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn exists(&self, key: &str) -> FaviconResult<bool> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(false),
                Some((_, expires_at)) if *expires_at > now => return Ok(true),
                Some(_) => {}
            }
        }
        // expired: evict under the write lock unless it was refreshed meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|(_, expires_at)| *expires_at <= now) {
            entries.remove(key);
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> FaviconResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> FaviconResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// "Domain failed recently" marks over a [`TtlStore`]
///
/// Store errors degrade to "not marked" so that a broken backing store can
/// only cause extra fetch attempts, never a wrongly suppressed domain.
#[derive(Clone)]
pub struct FailureLedger {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl FailureLedger {
    pub fn new(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key_for(domain: &str) -> String {
        format!("{KEY_PREFIX}{}", DomainCache::sanitize(domain))
    }

    pub async fn mark(&self, domain: &str) {
        self.mark_for(domain, self.ttl).await;
    }

    pub async fn mark_for(&self, domain: &str, ttl: Duration) {
        let key = Self::key_for(domain);
        let written_at = chrono::Utc::now().to_rfc3339();
        match self.store.set(&key, &written_at, ttl).await {
            Ok(()) => debug!(
                "Marked {} as failed for {}",
                domain,
                humantime::format_duration(ttl)
            ),
            Err(e) => warn!("Failed to record failure mark for {}: {}", domain, e),
        }
    }

    pub async fn is_marked(&self, domain: &str) -> bool {
        match self.store.exists(&Self::key_for(domain)).await {
            Ok(marked) => marked,
            Err(e) => {
                warn!("Failure ledger lookup failed for {}: {}", domain, e);
                false
            }
        }
    }

    /// Sweep expired marks out of the backing store
    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!("Purged {} expired failure marks", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Failure mark purge failed: {}", e);
                0
            }
        }
    }

    /// Purge expired marks every `every` until `cancel` fires
    pub async fn run_purge(self, every: Duration, cancel: CancellationToken) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Starting failure mark purge every {}",
            humantime::format_duration(every)
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.purge_expired().await;
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("Failure mark purge stopped");
    }

    pub async fn clear(&self, domain: &str) {
        if let Err(e) = self.store.delete(&Self::key_for(domain)).await {
            warn!("Failed to clear failure mark for {}: {}", domain, e);
        } else {
            debug!("Cleared failure mark for {}", domain);
        }
    }
}

impl std::fmt::Debug for FailureLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureLedger")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
