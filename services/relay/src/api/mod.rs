//! HTTP control surface.
//!
//! Mutating endpoints are gated by the shared secret; `/list` and `/healthz`
//! are open. The router must be served with
//! `into_make_service_with_connect_info::<SocketAddr>()` so that `/aio`
//! can register the caller's own address.

mod control;
mod health;

use axum::{http::StatusCode, Router};
use tower_http::trace::TraceLayer;

pub use control::{ControlQuery, ControlState};
pub use health::HealthResponse;

/// Create the control router with all routes and middleware.
pub fn create_router(state: ControlState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(control::routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
