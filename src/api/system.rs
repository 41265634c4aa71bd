//! Health endpoint reporting store connectivity.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: String,
}

/// GET /api/health
/// Always 200; the `database` field carries the connectivity flag.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check failed to reach database: {}", e);
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "ok",
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
