//! Virtual pool aggregation handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{PoolId, VirtualPoolConfig, VirtualPoolDraft, VirtualPoolId};
use crate::error::{ErrorResponse, MonitorError};
use crate::service::{AggregatedStatus, StrategyInfo, ValidationResult};

/// `GET /virtual-pools/status`: Aggregated status of every enabled virtual pool.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/virtual-pools/status",
    tag = "Virtual pools",
    summary = "All aggregated statuses",
    description = "Computed on every request from the latest snapshot of each member, in display order.",
    responses(
        (status = 200, description = "Aggregated statuses", body = Vec<AggregatedStatus>),
    )
)]
pub async fn all_statuses(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.all_aggregated_statuses().await?))
}

/// `GET /virtual-pools/{id}/status`: Aggregated status of one virtual pool.
///
/// # Errors
///
/// Returns [`MonitorError::VirtualPoolNotFound`] if it does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/virtual-pools/{id}/status",
    tag = "Virtual pools",
    summary = "Aggregated status",
    params(
        ("id" = i64, Path, description = "Virtual pool id"),
    ),
    responses(
        (status = 200, description = "Aggregated status", body = AggregatedStatus),
        (status = 404, description = "Virtual pool not found", body = ErrorResponse),
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(
        state
            .monitor
            .aggregated_status(VirtualPoolId::new(id))
            .await?,
    ))
}

/// `POST /virtual-pools/validate`: Check a candidate configuration.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure. Rejections are
/// reported in the body with status 200.
#[utoipa::path(
    post,
    path = "/api/v1/virtual-pools/validate",
    tag = "Virtual pools",
    summary = "Validate a virtual pool",
    description = "Rejects a blank name, no members, missing or disabled members, an unknown strategy and invalid weights.",
    request_body = VirtualPoolDraft,
    responses(
        (status = 200, description = "Validation result", body = ValidationResult),
    )
)]
pub async fn validate(
    State(state): State<AppState>,
    Json(draft): Json<VirtualPoolDraft>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.validate_virtual_pool(&draft).await?))
}

/// `POST /virtual-pools/preview`: Compute a candidate without saving it.
///
/// # Errors
///
/// Returns [`MonitorError::ConfigValidation`] if the candidate is invalid.
#[utoipa::path(
    post,
    path = "/api/v1/virtual-pools/preview",
    tag = "Virtual pools",
    summary = "Preview a virtual pool",
    request_body = VirtualPoolDraft,
    responses(
        (status = 200, description = "Aggregated status", body = AggregatedStatus),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    Json(draft): Json<VirtualPoolDraft>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.preview_virtual_pool(&draft).await?))
}

/// `GET /virtual-pools/strategies`: Strategy catalog.
#[utoipa::path(
    get,
    path = "/api/v1/virtual-pools/strategies",
    tag = "Virtual pools",
    summary = "Aggregation strategies",
    responses(
        (status = 200, description = "Strategies", body = Vec<StrategyInfo>),
    )
)]
pub async fn strategies(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.strategies())
}

/// `GET /virtual-pools/containing/{pool_id}`: Virtual pools including a pool.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/virtual-pools/containing/{pool_id}",
    tag = "Virtual pools",
    summary = "Virtual pools containing a pool",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
    ),
    responses(
        (status = 200, description = "Enabled virtual pools", body = Vec<VirtualPoolConfig>),
    )
)]
pub async fn containing(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(
        state
            .monitor
            .virtual_pools_containing(PoolId::new(pool_id))
            .await?,
    ))
}

/// Virtual pool routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/virtual-pools/status", get(all_statuses))
        .route("/virtual-pools/{id}/status", get(status))
        .route("/virtual-pools/validate", post(validate))
        .route("/virtual-pools/preview", post(preview))
        .route("/virtual-pools/strategies", get(strategies))
        .route("/virtual-pools/containing/{pool_id}", get(containing))
}
