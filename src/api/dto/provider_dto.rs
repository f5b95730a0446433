//! Request bodies for the provider test endpoints.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{PoolId, ProviderConfig};

/// Request body for `POST /providers/{id}/test-connection`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TestConnectionRequest {
    /// Provider configuration blob to probe with.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: ProviderConfig,
}

/// Request body for `POST /providers/{id}/test-fetch`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TestFetchRequest {
    /// Pool identity handed to the provider. Nothing is recorded for it.
    pub pool_id: PoolId,
    /// Pool name handed to the provider.
    #[serde(default)]
    pub pool_name: String,
    /// Provider configuration blob.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: ProviderConfig,
}
