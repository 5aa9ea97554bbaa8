use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_cache::{config::Config, favicon::FaviconCoordinator, web::WebServer};

#[derive(Parser)]
#[command(name = "favicon-cache")]
#[command(version)]
#[command(about = "Favicon discovery, decoding and multi-resolution caching service")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Favicon cache directory (overrides config file)
    #[arg(long, value_name = "DIR")]
    cache_path: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format (text, json)
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn init_tracing(cli: &Cli) {
    let log_filter = if cli.log_level == "trace" {
        format!("favicon_cache={},tower_http=trace", cli.log_level)
    } else {
        format!("favicon_cache={},tower_http=info", cli.log_level)
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(cache_path) = cli.cache_path {
        config.storage.favicon_cache_path = cache_path.into();
    }

    info!("Starting favicon-cache v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Favicon cache: {} (failure TTL {}, domain budget {})",
        config.storage.favicon_cache_path.display(),
        humantime::format_duration(config.failure_cache.ttl),
        humantime::format_duration(config.coordinator.domain_budget)
    );

    let coordinator = FaviconCoordinator::from_config(&config)?;
    coordinator.cache().ensure_dir().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    tokio::spawn(
        coordinator
            .ledger()
            .clone()
            .run_purge(config.failure_cache.purge_interval, shutdown.clone()),
    );

    let server = WebServer::new(&config, Arc::new(coordinator))?;

    server.serve_with_cancellation(shutdown).await?;
    info!("Favicon service stopped");
    Ok(())
}
