//! Monitor error types with HTTP status code mapping.
//!
//! [`ProviderError`] is the failure taxonomy a status provider may report
//! for a single pool. The polling orchestrator always recovers it locally.
//! [`MonitorError`] is the error type returned to callers of the service
//! facade. Each variant maps to an HTTP status code and a structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{PollStatus, PoolId, VirtualPoolId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "pool not found: 42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`MonitorError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure reported by a status provider for a single pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No provider is registered under the requested identifier.
    #[error("provider not found: {0}")]
    NotFound(String),

    /// The provider did not answer in time.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// The provider could not reach its backing system.
    #[error("provider connection error: {0}")]
    Connection(String),

    /// The provider answered with data that cannot be interpreted.
    #[error("provider returned a malformed result: {0}")]
    MalformedResult(String),

    /// The pool's provider configuration blob is unusable.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// Returns the poll status written back to the pool configuration.
    #[must_use]
    pub const fn poll_status(&self) -> PollStatus {
        match self {
            Self::Timeout(_) => PollStatus::Timeout,
            Self::NotFound(_)
            | Self::Connection(_)
            | Self::MalformedResult(_)
            | Self::InvalidConfig(_) => PollStatus::Failed,
        }
    }

    /// Returns a short machine-readable kind string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "provider_not_found",
            Self::Timeout(_) => "provider_timeout",
            Self::Connection(_) => "provider_connection_error",
            Self::MalformedResult(_) => "provider_malformed_result",
            Self::InvalidConfig(_) => "provider_invalid_config",
        }
    }
}

/// Service-level error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error  |
/// | 4000–4999 | Provider        | 502 Bad Gateway            |
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Pool with the given ID was not found.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    /// Virtual pool with the given ID was not found.
    #[error("virtual pool not found: {0}")]
    VirtualPoolNotFound(VirtualPoolId),

    /// The pool exists but is disabled.
    #[error("pool is disabled: {0}")]
    PoolDisabled(PoolId),

    /// No provider is registered under the pool's provider identifier.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// A provider call failed outside the polling path.
    #[error(transparent)]
    Provider(ProviderError),

    /// A virtual pool configuration was rejected.
    #[error("invalid virtual pool configuration: {0}")]
    ConfigValidation(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for MonitorError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(id) => Self::ProviderNotFound(id),
            other => Self::Provider(other),
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl MonitorError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::ConfigValidation(_) => 1002,
            Self::PoolNotFound(_) => 2001,
            Self::VirtualPoolNotFound(_) => 2002,
            Self::ProviderNotFound(_) => 2003,
            Self::PoolDisabled(_) => 2004,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Provider(ProviderError::Timeout(_)) => 4001,
            Self::Provider(ProviderError::Connection(_)) => 4002,
            Self::Provider(ProviderError::MalformedResult(_)) => 4003,
            Self::Provider(ProviderError::InvalidConfig(_)) => 4004,
            Self::Provider(ProviderError::NotFound(_)) => 2003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::ConfigValidation(_) => StatusCode::BAD_REQUEST,
            Self::PoolNotFound(_)
            | Self::VirtualPoolNotFound(_)
            | Self::ProviderNotFound(_)
            | Self::Provider(ProviderError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::PoolDisabled(_) => StatusCode::CONFLICT,
            Self::Provider(ProviderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
