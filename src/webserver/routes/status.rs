use axum::{extract::State, response::Response, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    hub::HubMetricsSnapshot,
    logger::{self, LogTag},
    webserver::{state::AppState, utils::success_response},
};

/// Simple health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub hub: HubMetricsSnapshot,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Create status routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(hub_metrics))
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    logger::debug(LogTag::Webserver, "Health check endpoint called");

    let status = if state.engine.is_shut_down() {
        "stopping"
    } else {
        "ok"
    };

    success_response(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /api/metrics
pub async fn hub_metrics(State(state): State<Arc<AppState>>) -> Response {
    success_response(MetricsResponse {
        hub: state.engine.metrics(),
        timestamp: Utc::now(),
    })
}
