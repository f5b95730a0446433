//! Provider catalog and ad-hoc test handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{TestConnectionRequest, TestFetchRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, MonitorError};
use crate::provider::ProviderDescriptor;
use crate::service::{ConnectionTest, FetchTest};

/// `GET /providers`: Registered providers.
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "Providers",
    summary = "List providers",
    responses(
        (status = 200, description = "Registered providers", body = Vec<ProviderDescriptor>),
    )
)]
pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.providers())
}

/// `POST /providers/{id}/test-connection`: Probe a provider.
///
/// # Errors
///
/// Returns [`MonitorError::ProviderNotFound`] or [`MonitorError::Provider`].
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/test-connection",
    tag = "Providers",
    summary = "Test provider connectivity",
    params(
        ("id" = String, Path, description = "Provider id"),
    ),
    request_body = TestConnectionRequest,
    responses(
        (status = 200, description = "Probe result", body = ConnectionTest),
        (status = 404, description = "Provider not found", body = ErrorResponse),
        (status = 502, description = "Probe failed", body = ErrorResponse),
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TestConnectionRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.monitor.test_connection(&id, &req.config).await?))
}

/// `POST /providers/{id}/test-fetch`: Fetch without recording.
///
/// # Errors
///
/// Returns [`MonitorError::ProviderNotFound`] or [`MonitorError::Provider`].
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/test-fetch",
    tag = "Providers",
    summary = "Test a provider fetch",
    description = "Runs the provider once with the given configuration. Nothing is stored and no pool is updated.",
    params(
        ("id" = String, Path, description = "Provider id"),
    ),
    request_body = TestFetchRequest,
    responses(
        (status = 200, description = "Fetched counts", body = FetchTest),
        (status = 404, description = "Provider not found", body = ErrorResponse),
        (status = 502, description = "Fetch failed", body = ErrorResponse),
        (status = 504, description = "Provider timed out", body = ErrorResponse),
    )
)]
pub async fn test_fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TestFetchRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    let result = state
        .monitor
        .test_fetch(&id, req.pool_id, &req.pool_name, &req.config)
        .await?;
    Ok(Json(result))
}

/// Provider routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/providers", get(list))
        .route("/providers/{id}/test-connection", post(test_connection))
        .route("/providers/{id}/test-fetch", post(test_fetch))
}
