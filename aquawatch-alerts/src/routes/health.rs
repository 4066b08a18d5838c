use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use aquawatch_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::store::Repository;
use crate::AppState;

/// Database and broker checks. A lost broker only degrades the service:
/// alerts still persist, fan-out waits.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let database = match state.repo.ping() {
        Ok(()) => HealthCheck::healthy("database"),
        Err(e) => HealthCheck::failing("database", HealthStatus::Unhealthy, e.to_string()),
    };
    let rabbitmq = if state.rabbitmq.is_connected() {
        HealthCheck::healthy("rabbitmq")
    } else {
        HealthCheck::failing("rabbitmq", HealthStatus::Degraded, "not connected")
    };

    let response = HealthResponse::healthy("aquawatch-alerts", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![database, rabbitmq]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
