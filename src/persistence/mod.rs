//! Persistence layer: snapshot time series and the configuration source.
//!
//! [`SnapshotStore`] owns the snapshot lifecycle (append, query, purge).
//! [`PoolConfigSource`] is the read side of the configuration store plus
//! the single write the monitor performs on it, the poll write-back.
//!
//! Two implementations exist for each: in-memory (tests, and
//! `PERSISTENCE_ENABLED=false`) and PostgreSQL via `sqlx`.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{
    NewSnapshot, Page, PollResult, PoolConfig, PoolId, SeriesStatistics, StatusSnapshot,
    TimeRange, VirtualPoolConfig, VirtualPoolId, series,
};
use crate::error::MonitorError;

pub use memory::{InMemoryConfigStore, InMemorySnapshotStore};
pub use postgres::{PostgresConfigStore, PostgresSnapshotStore};

/// Append-only snapshot time series.
///
/// Implementations must accept concurrent appends from many in-flight
/// poll units alongside concurrent reads.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Inserts one snapshot and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn append(&self, snapshot: NewSnapshot) -> Result<StatusSnapshot, MonitorError>;

    /// Inserts several snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure. Snapshots
    /// inserted before the failure stay inserted.
    async fn append_batch(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        let mut saved = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            saved.push(self.append(snapshot).await?);
        }
        Ok(saved)
    }

    /// Most recent snapshot of a pool by `recorded_at`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn latest(&self, pool_id: PoolId) -> Result<Option<StatusSnapshot>, MonitorError>;

    /// Most recent snapshot of each listed pool. Pools without data are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn latest_batch(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<HashMap<PoolId, StatusSnapshot>, MonitorError>;

    /// Snapshots of a pool within `range`, ascending by `recorded_at`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn range(
        &self,
        pool_id: PoolId,
        range: TimeRange,
    ) -> Result<Vec<StatusSnapshot>, MonitorError>;

    /// One page of snapshots, newest first, optionally for a single pool.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn page(
        &self,
        pool_id: Option<PoolId>,
        range: TimeRange,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StatusSnapshot>, MonitorError>;

    /// Deletes every snapshot with `recorded_at < cutoff` and returns how
    /// many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn purge_older_than(&self, cutoff: i64) -> Result<u64, MonitorError>;

    /// Decimated range; see [`series::decimate`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn trend(
        &self,
        pool_id: PoolId,
        range: TimeRange,
        interval_secs: Option<i64>,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        Ok(series::decimate(self.range(pool_id, range).await?, interval_secs))
    }

    /// Summary of a range; see [`series::statistics`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn statistics(
        &self,
        pool_id: PoolId,
        range: TimeRange,
    ) -> Result<SeriesStatistics, MonitorError> {
        Ok(series::statistics(&self.range(pool_id, range).await?))
    }
}

/// Read access to pool and virtual-pool configuration, plus the poll
/// write-back.
#[async_trait]
pub trait PoolConfigSource: Send + Sync + std::fmt::Debug {
    /// Every enabled pool, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn list_enabled_pools(&self) -> Result<Vec<PoolConfig>, MonitorError>;

    /// One pool, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn get_pool(&self, id: PoolId) -> Result<Option<PoolConfig>, MonitorError>;

    /// Every enabled virtual pool, ascending by `display_order` then id.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn list_enabled_virtual_pools(&self) -> Result<Vec<VirtualPoolConfig>, MonitorError>;

    /// One virtual pool, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn get_virtual_pool(
        &self,
        id: VirtualPoolId,
    ) -> Result<Option<VirtualPoolConfig>, MonitorError>;

    /// Records the outcome of a fetch attempt on the pool.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PoolNotFound`] if the pool no longer exists,
    /// or [`MonitorError::Persistence`] on storage failure.
    async fn record_poll_result(&self, id: PoolId, result: &PollResult)
    -> Result<(), MonitorError>;
}

/// Rejects a zero page size and caps it at 1000.
pub(crate) fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, 1_000)
}
