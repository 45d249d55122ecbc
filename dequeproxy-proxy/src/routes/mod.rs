//! HTTP route handlers for the dequeproxy admin endpoints.

pub mod health;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// Re-export handlers for convenience
pub use health::{health, live, metrics, metrics_prometheus, ready};

/// Build the admin router
pub fn admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/metrics", get(metrics))
        .route("/metrics/prometheus", get(metrics_prometheus))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
