use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnaround_core::TurnaroundConfig;

mod routes;
mod runner;
mod sim;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "turnaround_gateway=debug,turnaround_core=info,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let tick_override = std::env::var("TURNAROUND_TICK_MS")
        .ok()
        .map(|ms| ms.parse::<u64>().context("TURNAROUND_TICK_MS must be milliseconds"))
        .transpose()?
        .map(Duration::from_millis);
    if let Some(tick) = tick_override {
        tracing::info!("   Fixed poll interval {:?}", tick);
    }

    let state = routes::AppState {
        runner: runner::spawn(config.clone(), tick_override),
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", routes::turnaround_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let port = std::env::var("TURNAROUND_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18610".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Turnaround Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Configuration from the JSON file named by `TURNAROUND_CONFIG`, else defaults
fn load_config() -> Result<TurnaroundConfig> {
    let config = match std::env::var("TURNAROUND_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            let config: TurnaroundConfig =
                serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path))?;
            tracing::info!("   Loaded config from {}", path);
            config
        }
        Err(_) => TurnaroundConfig::default(),
    };
    config.validate().context("invalid turnaround config")?;
    Ok(config)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "turnaround-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
