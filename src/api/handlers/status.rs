//! Snapshot query and manual-save handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{
    HistoryParams, LatestBatchRequest, PurgeResponse, RangeParams, RetentionParams,
    ThresholdParams, TrendParams,
};
use crate::app_state::AppState;
use crate::domain::{
    NamedSnapshot, Page, PoolId, Pressure, SeriesStatistics, StatusSnapshot, TimeRange,
};
use crate::error::{ErrorResponse, MonitorError};
use crate::service::{AbnormalCheck, ManualSnapshot, PressureDistribution, StatusOverview};

/// `GET /status/latest`: Latest snapshot of every enabled pool.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/latest",
    tag = "Status",
    summary = "Latest snapshots",
    description = "Latest snapshot of every enabled pool that has data, with the pool name.",
    responses(
        (status = 200, description = "Latest snapshots", body = Vec<NamedSnapshot>),
    )
)]
pub async fn latest_all(State(state): State<AppState>) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.latest_all_enabled().await?))
}

/// `GET /status/latest/{pool_id}`: Latest snapshot of one pool.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/latest/{pool_id}",
    tag = "Status",
    summary = "Latest snapshot of a pool",
    description = "Most recent snapshot by measurement time, or `null` when the pool has no data.",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
    ),
    responses(
        (status = 200, description = "Latest snapshot or null", body = StatusSnapshot),
    )
)]
pub async fn latest_one(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.latest_status(PoolId::new(pool_id)).await?))
}

/// `POST /status/latest/batch`: Latest snapshot of several pools.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/status/latest/batch",
    tag = "Status",
    summary = "Latest snapshots of listed pools",
    description = "Map of pool id to latest snapshot. Pools without data are omitted.",
    request_body = LatestBatchRequest,
    responses(
        (status = 200, description = "Pool id to snapshot", body = serde_json::Value),
    )
)]
pub async fn latest_batch(
    State(state): State<AppState>,
    Json(req): Json<LatestBatchRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.latest_statuses(&req.pool_ids).await?))
}

/// `GET /status/history`: Paged history, newest first.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an inverted range.
#[utoipa::path(
    get,
    path = "/api/v1/status/history",
    tag = "Status",
    summary = "Snapshot history",
    description = "Paged snapshots, newest first, optionally for one pool.",
    params(HistoryParams),
    responses(
        (status = 200, description = "One page of snapshots", body = Page<StatusSnapshot>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let page = state
        .monitor
        .status_history(params.pool_id, params.range(), params.page, params.page_size)
        .await?;
    Ok(Json(page))
}

/// `GET /status/trend/{pool_id}`: Decimated series.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an inverted range.
#[utoipa::path(
    get,
    path = "/api/v1/status/trend/{pool_id}",
    tag = "Status",
    summary = "Snapshot trend",
    description = "Ascending series thinned so kept samples are at least `interval_secs` apart.",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
        TrendParams,
    ),
    responses(
        (status = 200, description = "Decimated series", body = Vec<StatusSnapshot>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn trend(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
    Query(params): Query<TrendParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let series = state
        .monitor
        .status_trend(
            PoolId::new(pool_id),
            TimeRange::new(params.start, params.end),
            params.interval_secs,
        )
        .await?;
    Ok(Json(series))
}

/// `GET /status/statistics/{pool_id}`: Range summary.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an inverted range.
#[utoipa::path(
    get,
    path = "/api/v1/status/statistics/{pool_id}",
    tag = "Status",
    summary = "Snapshot statistics",
    description = "Record count, mean pressure and valid-count extremes over a range.",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
        RangeParams,
    ),
    responses(
        (status = 200, description = "Range statistics", body = SeriesStatistics),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn statistics(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
    Query(params): Query<RangeParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let stats = state
        .monitor
        .status_statistics(PoolId::new(pool_id), params.range())
        .await?;
    Ok(Json(stats))
}

/// `GET /status/overview`: Summary across enabled pools.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/overview",
    tag = "Status",
    summary = "Status overview",
    responses(
        (status = 200, description = "Overview", body = StatusOverview),
    )
)]
pub async fn overview(State(state): State<AppState>) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.overview().await?))
}

/// `GET /status/high-pressure`: Pools above a pressure threshold.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/high-pressure",
    tag = "Status",
    summary = "High-pressure pools",
    description = "Latest snapshots above the threshold, highest pressure first.",
    params(ThresholdParams),
    responses(
        (status = 200, description = "High-pressure pools", body = Vec<NamedSnapshot>),
    )
)]
pub async fn high_pressure(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let threshold = params.threshold.map(Pressure::from_percent);
    Ok(Json(state.monitor.high_pressure(threshold).await?))
}

/// `GET /status/pressure-distribution`: Pools bucketed by pressure.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/pressure-distribution",
    tag = "Status",
    summary = "Pressure distribution",
    description = "Counts of latest snapshots with pressure ≤ 50, ≤ 80 and > 80.",
    responses(
        (status = 200, description = "Distribution", body = PressureDistribution),
    )
)]
pub async fn pressure_distribution(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.pressure_distribution().await?))
}

/// `GET /status/abnormal/{pool_id}`: Abnormal-status check.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/status/abnormal/{pool_id}",
    tag = "Status",
    summary = "Abnormal check",
    description = "A pool is abnormal with no data, stale data, pressure above 95 or no valid resources.",
    params(
        ("pool_id" = i64, Path, description = "Pool id"),
    ),
    responses(
        (status = 200, description = "Check result", body = AbnormalCheck),
    )
)]
pub async fn abnormal(
    State(state): State<AppState>,
    Path(pool_id): Path<i64>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.abnormal(PoolId::new(pool_id)).await?))
}

/// `POST /status`: Save a manual snapshot.
///
/// # Errors
///
/// Returns [`MonitorError::PoolNotFound`] or
/// [`MonitorError::InvalidRequest`].
#[utoipa::path(
    post,
    path = "/api/v1/status",
    tag = "Status",
    summary = "Save a manual snapshot",
    description = "Stores operator-supplied counts tagged `manual`. Pressure is always derived from the counts.",
    request_body = ManualSnapshot,
    responses(
        (status = 201, description = "Snapshot stored", body = StatusSnapshot),
        (status = 400, description = "Invalid counts", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn save(
    State(state): State<AppState>,
    Json(req): Json<ManualSnapshot>,
) -> Result<impl IntoResponse, MonitorError> {
    let saved = state.monitor.save_manual(req).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `POST /status/batch`: Save several manual snapshots.
///
/// # Errors
///
/// Returns [`MonitorError::PoolNotFound`] or
/// [`MonitorError::InvalidRequest`]; nothing is stored in that case.
#[utoipa::path(
    post,
    path = "/api/v1/status/batch",
    tag = "Status",
    summary = "Save manual snapshots",
    request_body = Vec<ManualSnapshot>,
    responses(
        (status = 201, description = "Snapshots stored", body = Vec<StatusSnapshot>),
        (status = 400, description = "Invalid entry", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn save_batch(
    State(state): State<AppState>,
    Json(req): Json<Vec<ManualSnapshot>>,
) -> Result<impl IntoResponse, MonitorError> {
    let saved = state.monitor.save_manual_batch(req).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `DELETE /status/expired`: Purge old snapshots.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for zero retention days.
#[utoipa::path(
    delete,
    path = "/api/v1/status/expired",
    tag = "Status",
    summary = "Purge expired snapshots",
    description = "Hard-deletes snapshots recorded more than `retention_days` days ago.",
    params(RetentionParams),
    responses(
        (status = 200, description = "Purge result", body = PurgeResponse),
        (status = 400, description = "Invalid retention", body = ErrorResponse),
    )
)]
pub async fn purge_expired(
    State(state): State<AppState>,
    Query(params): Query<RetentionParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let retention_days = params.retention_days.unwrap_or(state.retention_days);
    let deleted = state.monitor.purge_expired(retention_days).await?;
    Ok(Json(PurgeResponse {
        retention_days,
        deleted,
    }))
}

/// Snapshot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", post(save))
        .route("/status/batch", post(save_batch))
        .route("/status/expired", delete(purge_expired))
        .route("/status/latest", get(latest_all))
        .route("/status/latest/batch", post(latest_batch))
        .route("/status/latest/{pool_id}", get(latest_one))
        .route("/status/history", get(history))
        .route("/status/trend/{pool_id}", get(trend))
        .route("/status/statistics/{pool_id}", get(statistics))
        .route("/status/overview", get(overview))
        .route("/status/high-pressure", get(high_pressure))
        .route("/status/pressure-distribution", get(pressure_distribution))
        .route("/status/abnormal/{pool_id}", get(abnormal))
}
