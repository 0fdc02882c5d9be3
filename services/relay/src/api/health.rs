//! Health check endpoint.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::control::ControlState;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Service name.
    pub service: String,

    /// Service version.
    pub version: String,

    /// Number of access list entries.
    pub entries: usize,
}

/// Create health check routes.
pub fn routes() -> Router<ControlState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness probe. Does not touch the relay listeners.
async fn healthz(State(state): State<ControlState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "hostrelay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries: state.access.len().await,
    })
}
