//! Health check and metrics endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::state::AppState;

/// Health check endpoint
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = if state.shutdown.is_cancelled() { "stopping" } else { "healthy" };
    Json(json!({
        "status": status,
        "queue_depth": state.queue.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Queue configuration and totals
///
/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.queue.stats();
    let queue_config = state.queue.config();

    Json(json!({
        "proxy": {
            "upstream": state.config.upstream,
            "workers": state.config.workers
        },
        "queue": {
            "config": {
                "timeout_ms": queue_config.timeout_ms(),
                "threshold": queue_config.threshold
            },
            "current": {
                "depth": stats.remaining
            },
            "totals": {
                "enqueued": stats.enqueued_total,
                "delivered_fifo": stats.delivered_fifo,
                "delivered_lifo": stats.delivered_lifo,
                "evicted": stats.evicted_total,
                "drained": stats.drained_total,
                "close_failures": stats.close_failures,
                "max_depth": stats.max_depth
            },
            "performance": {
                "total_wait_ms": stats.total_wait_ms,
                "avg_wait_ms": stats.avg_wait_ms,
                "lifo_ratio": stats.lifo_ratio()
            }
        }
    }))
}

/// Prometheus text exposition
///
/// GET /metrics/prometheus
pub async fn metrics_prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    metrics::observe_queue(&state.queue.stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

/// Ready check (for Kubernetes)
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.shutdown.is_cancelled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Live check (for Kubernetes)
///
/// GET /live
pub async fn live() -> impl IntoResponse {
    StatusCode::OK
}
