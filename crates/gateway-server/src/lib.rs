//! HTTP API surface (§6): agent listing/search, agent detail, classification
//! trigger, chains, taxonomy, health — grounded on
//! `dashflow-registry::api::server::ApiServer` for the router/middleware
//! assembly shape.

pub mod error;
pub mod middleware;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware as axum_middleware;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use state::{AppState, ServerConfig, TAXONOMY_CONFIDENCE_THRESHOLD};

/// Bind address plus whatever else governs how the assembled router is
/// served, separate from [`ServerConfig`] (which governs request handling).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)) }
    }
}

/// Assemble the complete router: resource routes nested under their
/// prefixes, health at the root, and the middleware stack layered the way
/// the teacher layers it (outermost first: body-size limit, then CORS and
/// tracing, then request-id innermost so it sees the raw request first).
///
/// Per-route rate limiting sits at the ingress, outside this gateway (§1);
/// `state.rate_limiter` is the seam a reverse proxy or sidecar would
/// consult, not a layer of this stack, so it is not wired in here.
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    let api = Router::new()
        .nest("/agents", routes::agents_router())
        .nest("/search", routes::search::routes())
        .nest("/chains", routes::chains::routes())
        .nest("/taxonomy", routes::taxonomy::routes())
        .merge(routes::health::health_routes())
        .with_state(state);

    api.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(RequestBodyLimitLayer::new(max_body_size))
}

/// Bind and serve `router` until a Ctrl+C or SIGTERM is received (§6
/// "Runtime"), grounded on
/// `dashflow-registry/src/bin/registry_server.rs`'s `shutdown_signal`.
pub async fn serve(router: Router, config: ApiConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "gateway listening");

    axum::serve(listener, router.into_make_service()).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    tokio::time::sleep(Duration::from_millis(50)).await;
}
