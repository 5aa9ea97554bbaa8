use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub failure_cache: FailureCacheConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Flat directory holding every cached icon file
    #[serde(default = "default_favicon_cache_path")]
    pub favicon_cache_path: PathBuf,
}

/// Outbound HTTP settings used for page discovery and icon downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(with = "duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(with = "duration", default = "default_read_timeout")]
    pub read_timeout: Duration,
    /// reqwest has no separate write timeout; this is folded into the
    /// overall request deadline together with connect and read
    #[serde(with = "duration", default = "default_write_timeout")]
    pub write_timeout: Duration,
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureCacheConfig {
    /// How long a failed domain is left alone before it is retried
    #[serde(with = "duration", default = "default_failure_ttl")]
    pub ttl: Duration,
    /// How often expired marks are swept out of the in-process store
    #[serde(with = "duration", default = "default_failure_purge_interval")]
    pub purge_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Overall time allowed for discovering and downloading one domain's icon
    #[serde(with = "duration", default = "default_domain_budget")]
    pub domain_budget: Duration,
    /// Concurrent domains processed by a batch reload
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Storage defaults
fn default_favicon_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_FAVICON_CACHE_PATH)
}

// Fetcher defaults
fn parse_default(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_secs(10))
}

fn default_connect_timeout() -> Duration {
    parse_default(DEFAULT_CONNECT_TIMEOUT)
}

fn default_read_timeout() -> Duration {
    parse_default(DEFAULT_READ_TIMEOUT)
}

fn default_write_timeout() -> Duration {
    parse_default(DEFAULT_WRITE_TIMEOUT)
}

fn default_max_icon_bytes() -> usize {
    DEFAULT_MAX_ICON_BYTES
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

// Failure cache defaults
fn default_failure_ttl() -> Duration {
    parse_default(DEFAULT_FAILURE_TTL)
}

fn default_failure_purge_interval() -> Duration {
    parse_default(DEFAULT_FAILURE_PURGE_INTERVAL)
}

// Coordinator defaults
fn default_domain_budget() -> Duration {
    parse_default(DEFAULT_DOMAIN_BUDGET)
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            favicon_cache_path: default_favicon_cache_path(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            max_icon_bytes: default_max_icon_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl FetcherConfig {
    /// Upper bound for one request/response exchange
    pub fn request_deadline(&self) -> Duration {
        self.connect_timeout + self.read_timeout + self.write_timeout
    }
}

impl Default for FailureCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_failure_ttl(),
            purge_interval: default_failure_purge_interval(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            domain_budget: default_domain_budget(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coordinator.batch_concurrency == 0 {
            anyhow::bail!("coordinator.batch_concurrency must be at least 1");
        }
        if self.coordinator.domain_budget.is_zero() {
            anyhow::bail!("coordinator.domain_budget must be greater than zero");
        }
        if self.fetcher.connect_timeout.is_zero() || self.fetcher.read_timeout.is_zero() {
            anyhow::bail!("fetcher timeouts must be greater than zero");
        }
        if self.failure_cache.purge_interval.is_zero() {
            anyhow::bail!("failure_cache.purge_interval must be greater than zero");
        }
        if self.fetcher.user_agent.trim().is_empty() {
            anyhow::bail!("fetcher.user_agent must not be empty");
        }
        Ok(())
    }
}
