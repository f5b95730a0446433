//! Status providers: the capability contract, the registry, and the
//! built-in implementations.
//!
//! A provider knows how to fetch raw counts for a pool and how to test
//! connectivity to whatever backs it. Providers are bound to identifiers
//! at registration time and looked up by the `provider_id` stored on each
//! pool. An identifier with no registration is a
//! [`ProviderError::NotFound`].

pub mod http;
pub mod mock;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{PoolId, ProviderConfig, SnapshotCandidate};
use crate::error::ProviderError;

pub use http::HttpProvider;
pub use mock::MockProvider;
pub use registry::ProviderRegistry;

/// Identifier and description of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProviderDescriptor {
    /// Registration identifier.
    pub id: String,
    /// Human-readable description.
    pub description: String,
}

/// Capability contract every status provider implements.
#[async_trait]
pub trait StatusProvider: Send + Sync + std::fmt::Debug {
    /// Fetches the current counts of one pool.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the backing system times out, cannot
    /// be reached, answers with unusable data, or the configuration blob
    /// is unusable.
    async fn fetch_status(
        &self,
        pool_id: PoolId,
        pool_name: &str,
        config: &ProviderConfig,
    ) -> Result<SnapshotCandidate, ProviderError>;

    /// Tests connectivity to the backing system.
    ///
    /// `Ok(false)` means the system answered but reported itself unhealthy.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the probe itself could not run.
    async fn check_connection(&self, config: &ProviderConfig) -> Result<bool, ProviderError>;

    /// Returns this provider's identifier and description.
    fn describe(&self) -> ProviderDescriptor;
}
