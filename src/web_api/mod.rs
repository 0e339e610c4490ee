//! WebAPI - REST + WebSocket Gateway
//!
//! ## Responsibilities
//!
//! - HTTP API routes for pins
//! - Request parsing (JSON or multipart form)
//! - Response formatting
//! - WebSocket endpoint for realtime pin events

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let detector_ok = state.detection.health_check().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.uptime_sec(),
        detector_connected: detector_ok,
        pin_count: state.pins.len().await,
        realtime_clients: state.realtime.connection_count(),
    };

    Json(response)
}
