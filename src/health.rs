//! Liveness endpoint for hosts that expect the process to listen on a port.

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
}

/// Serve the liveness endpoint until the process exits.
pub async fn serve(port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind health endpoint on port {}", port))?;

    info!("Health endpoint listening on port {}", port);

    axum::serve(listener, router())
        .await
        .context("Health endpoint error")?;

    Ok(())
}
