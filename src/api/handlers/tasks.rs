//! Polling trigger handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::PoolId;
use crate::error::{ErrorResponse, MonitorError};
use crate::service::{BatchReport, TaskStatistics, UnitReport};

/// `POST /tasks/poll-all`: Poll every enabled pool now.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] if the pool list cannot be read.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/poll-all",
    tag = "Tasks",
    summary = "Run a polling batch",
    description = "Polls every enabled pool once and waits for the batch deadline. Per-pool failures are reported in the batch, never as an error response.",
    responses(
        (status = 200, description = "Batch report", body = BatchReport),
        (status = 500, description = "Pool list unavailable", body = ErrorResponse),
    )
)]
pub async fn poll_all(State(state): State<AppState>) -> Result<impl IntoResponse, MonitorError> {
    let report = state.monitor.poll_all_now().await?;
    Ok(Json(report))
}

/// `POST /tasks/poll/{pool_id}`: Poll one pool now.
///
/// # Errors
///
/// Returns [`MonitorError::PoolNotFound`], [`MonitorError::PoolDisabled`]
/// or [`MonitorError::ProviderNotFound`].
#[utoipa::path(
    post,
    path = "/api/v1/tasks/poll/{pool_id}",
    tag = "Tasks",
    summary = "Poll one pool",
    description = "Runs a single fetch-and-record unit. A provider failure still records an error snapshot and is returned in the report.",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
    ),
    responses(
        (status = 200, description = "Unit report", body = UnitReport),
        (status = 404, description = "Pool or provider not found", body = ErrorResponse),
        (status = 409, description = "Pool disabled", body = ErrorResponse),
    )
)]
pub async fn poll_one(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
) -> Result<impl IntoResponse, MonitorError> {
    let report = state.monitor.poll_one(PoolId::new(pool_id)).await?;
    Ok(Json(report))
}

/// `GET /tasks/statistics`: Orchestrator state.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/statistics",
    tag = "Tasks",
    summary = "Task statistics",
    description = "Worker pool width and availability, units in flight, batch phase and the last batch report.",
    responses(
        (status = 200, description = "Task statistics", body = TaskStatistics),
    )
)]
pub async fn statistics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.task_statistics().await)
}

/// Polling trigger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/poll-all", post(poll_all))
        .route("/tasks/poll/{pool_id}", post(poll_one))
        .route("/tasks/statistics", get(statistics))
}
