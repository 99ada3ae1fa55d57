//! Points core server binary
//!
//! Opens the store and serves `/health` and `/metrics` until interrupted.
//! Usage: `points-server [config.toml]`; without a file, `POINTS_*` environment variables apply.

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use points_core::{Config, PointsCore};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    version: String,
    total_accounts: Option<u64>,
    total_registrations: Option<u64>,
}

async fn health_check(State(core): State<PointsCore>) -> (StatusCode, Json<HealthResponse>) {
    let config = core.config();
    let (status, code, stats) = match core.storage_stats() {
        Ok(stats) => ("healthy", StatusCode::OK, stats),
        Err(e) => {
            tracing::warn!(error = %e, "Storage statistics unavailable");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: config.service_name.clone(),
            version: config.service_version.clone(),
            total_accounts: stats.as_ref().map(|s| s.total_accounts),
            total_registrations: stats.as_ref().map(|s| s.total_registrations),
        }),
    )
}

async fn metrics_handler(State(core): State<PointsCore>) -> String {
    core.metrics().render()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting points core server"
    );

    let bind_addr = config.metrics_listen_addr.clone();
    let core = PointsCore::open(config)
        .await
        .context("opening points store")?;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(core.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("Listening on {} (GET /health, GET /metrics)", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Shutting down points core server");
    core.shutdown().await?;
    Ok(())
}
