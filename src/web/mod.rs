//! Web layer module
//!
//! HTTP surface for the favicon engine. Handlers are thin: they validate
//! request parameters, delegate to the [`FaviconCoordinator`] and translate
//! the outcome into status codes and the shared [`ApiResponse`] envelope.

use anyhow::Result;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::favicon::FaviconCoordinator;

pub mod handlers;
pub mod responses;

pub use responses::{ApiResponse, handle_error, handle_result};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FaviconCoordinator>,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, coordinator: Arc<FaviconCoordinator>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let app = Self::create_router(AppState { coordinator });
        Ok(Self { app, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health_check))
            .nest("/api/v1", Self::api_v1_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn api_v1_routes() -> Router<AppState> {
        Router::new()
            // literal segments win over the {domain} capture, so a domain
            // named "cache" or "reload" cannot be looked up here
            .route(
                "/favicons/cache",
                delete(handlers::favicons::clear_cache),
            )
            .route(
                "/favicons/reload",
                post(handlers::favicons::reload_favicons),
            )
            .route("/favicons/{domain}", get(handlers::favicons::get_favicon))
            .route(
                "/favicons/{domain}/failed",
                get(handlers::favicons::get_failed_status)
                    .delete(handlers::favicons::clear_failed_mark),
            )
            .route("/favicon-url", get(handlers::favicons::get_favicon_url))
            .route(
                "/favicon-inspect",
                get(handlers::favicons::inspect_favicons),
            )
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve_with_cancellation(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        tracing::info!("Favicon service listening on {}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("Web server received cancellation signal, shutting down gracefully");
            })
            .await?;
        Ok(())
    }
}
