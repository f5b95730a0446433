//! System endpoints: process health and provider connectivity.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, MonitorError};
use crate::service::ConnectionHealthReport;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    event_subscribers: usize,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            event_subscribers: state.event_bus.receiver_count(),
        }),
    )
}

/// `GET /health/connections`: Provider connectivity of enabled pools.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] if no report is cached and the
/// pool list cannot be read.
#[utoipa::path(
    get,
    path = "/health/connections",
    tag = "System",
    summary = "Connection health",
    description = "Last connection health report; a fresh check runs if none exists yet.",
    responses(
        (status = 200, description = "Connection report", body = ConnectionHealthReport),
        (status = 500, description = "Pool list unavailable", body = ErrorResponse),
    )
)]
pub async fn connections_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.connection_health().await?))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/connections", get(connections_handler))
}
