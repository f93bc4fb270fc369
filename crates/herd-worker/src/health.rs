use crate::ConnectionGauge;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// State for the harness-mounted internal routes.
#[derive(Clone)]
pub struct HealthState {
    pub gauge: Arc<ConnectionGauge>,
    pub port: u16,
    pub title: String,
}

/// Routes the harness mounts next to the application: also what the
/// supervisor's readiness probe polls.
pub fn internal_routes(state: HealthState) -> Router {
    Router::new()
        .route("/internal/health", get(health_check))
        .route("/internal/ready", get(readiness_check))
        .with_state(state)
}

/// GET /internal/health - worker status snapshot
async fn health_check(State(state): State<HealthState>) -> Response {
    let status = if state.gauge.is_draining() {
        "draining"
    } else {
        "healthy"
    };

    let health = json!({
        "status": status,
        "title": state.title,
        "pid": std::process::id(),
        "port": state.port,
        "active_connections": state.gauge.active(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(health)).into_response()
}

/// GET /internal/ready - ready to accept traffic?
async fn readiness_check(State(state): State<HealthState>) -> Response {
    if state.gauge.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "Draining").into_response()
    } else {
        (StatusCode::OK, "Ready").into_response()
    }
}
