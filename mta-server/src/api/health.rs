//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Module name ("mta-server")
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Live WebSocket rooms
    pub rooms: usize,
}

/// GET /health (no auth)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = mta_common::time::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mta-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        rooms: state.hub.room_count(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
