/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Storage defaults
pub const DEFAULT_FAVICON_CACHE_PATH: &str = "./data/favicons";

// Fetcher defaults
pub const DEFAULT_CONNECT_TIMEOUT: &str = "10s";
pub const DEFAULT_READ_TIMEOUT: &str = "30s";
pub const DEFAULT_WRITE_TIMEOUT: &str = "10s";
pub const DEFAULT_MAX_ICON_BYTES: usize = 5 * 1024 * 1024; // 5MB
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

// Failure cache defaults
pub const DEFAULT_FAILURE_TTL: &str = "1d";
pub const DEFAULT_FAILURE_PURGE_INTERVAL: &str = "1h";

// Coordinator defaults
pub const DEFAULT_DOMAIN_BUDGET: &str = "30s";
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; {}/{}; +favicon-fetcher)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
