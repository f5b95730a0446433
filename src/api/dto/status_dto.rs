//! Request and response bodies for snapshot endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::PoolId;

/// Request body for `POST /status/latest/batch`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LatestBatchRequest {
    /// Pools to look up; pools without data are omitted from the answer.
    pub pool_ids: Vec<PoolId>,
}

/// Response body for `DELETE /status/expired`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurgeResponse {
    /// Retention applied.
    pub retention_days: u32,
    /// Snapshots removed.
    pub deleted: u64,
}
