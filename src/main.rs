//! ShopLens - Qoo10 listing analysis backend
//!
//! Submit a product or shop URL, poll for a structured report: normalized
//! record, per-dimension scores, checklist evaluation, recommendations and a
//! self-validation pass. The extraction layer learns which selectors, user
//! agents and proxies work and keeps getting better at the marketplace.

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shoplens_backend::api::{routes, AppState};
use shoplens_backend::models::Config;
use shoplens_backend::store::PerformanceStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "ShopLens backend starting (db: {}, workers: {})",
        config.database_path, config.worker_concurrency
    );

    let store = Arc::new(
        PerformanceStore::new(&config.database_path)
            .context("Failed to open performance store")?,
    );
    let state = AppState::build(&config, store)?;

    let app = Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/v1/analyze", post(routes::start_analysis))
        .route("/api/v1/analyze/:job_id", get(routes::get_analysis))
        .route(
            "/api/v1/analyze/:job_id/download",
            get(routes::download_report),
        )
        .route(
            "/api/v1/monitor/success-rates",
            get(routes::get_success_rates),
        )
        .route(
            "/api/v1/monitor/stages/:stage",
            get(routes::get_stage_details),
        )
        .route(
            "/api/v1/crawler/statistics",
            get(routes::get_crawler_statistics),
        )
        .route("/api/v1/error-report", post(routes::submit_error_report))
        .route(
            "/api/v1/error-report/:report_id/resolve",
            post(routes::resolve_error_report),
        )
        .with_state(state)
        .layer(cors_layer(&config));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// CORS from ALLOWED_ORIGINS; permissive in dev when unset.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoplens_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
