//! PostgreSQL implementations of the stores.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{
    POOL_COLUMNS, PoolRow, SNAPSHOT_COLUMNS, SnapshotRow, VIRTUAL_POOL_COLUMNS, VirtualPoolRow,
    pool_from_row, snapshot_from_row, virtual_pool_from_row,
};
use super::{PoolConfigSource, SnapshotStore, clamp_page_size};
use crate::domain::{
    NewSnapshot, Page, PollResult, PoolConfig, PoolId, StatusSnapshot, TimeRange,
    VirtualPoolConfig, VirtualPoolId, now_millis,
};
use crate::error::MonitorError;

const INSERT_SNAPSHOT: &str = "INSERT INTO pool_status (pool_id, valid_count, invalid_count, \
     cooling_count, total_count, pressure, recorded_at, source_tag, remarks, error_message, \
     created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id";

/// Snapshot series in the `pool_status` table.
///
/// Purging is a hard `DELETE`.
#[derive(Debug, Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Creates a store on the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn convert_all(rows: Vec<SnapshotRow>) -> Result<Vec<StatusSnapshot>, MonitorError> {
    rows.into_iter().map(snapshot_from_row).collect()
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn append(&self, snapshot: NewSnapshot) -> Result<StatusSnapshot, MonitorError> {
        let created_at = now_millis();
        let id = sqlx::query_scalar::<_, i64>(INSERT_SNAPSHOT)
        .bind(snapshot.pool_id.get())
        .bind(snapshot.counts.valid_count)
        .bind(snapshot.counts.invalid_count)
        .bind(snapshot.counts.cooling_count)
        .bind(snapshot.counts.total_count)
        .bind(snapshot.pressure.as_percent())
        .bind(snapshot.recorded_at)
        .bind(snapshot.source_tag.as_str())
        .bind(snapshot.remarks.as_deref())
        .bind(snapshot.error.as_deref())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(snapshot.into_snapshot(id, created_at))
    }

    async fn append_batch(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let created_at = now_millis();
            let id = sqlx::query_scalar::<_, i64>(INSERT_SNAPSHOT)
            .bind(snapshot.pool_id.get())
            .bind(snapshot.counts.valid_count)
            .bind(snapshot.counts.invalid_count)
            .bind(snapshot.counts.cooling_count)
            .bind(snapshot.counts.total_count)
            .bind(snapshot.pressure.as_percent())
            .bind(snapshot.recorded_at)
            .bind(snapshot.source_tag.as_str())
            .bind(snapshot.remarks.as_deref())
            .bind(snapshot.error.as_deref())
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(snapshot.into_snapshot(id, created_at));
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn latest(&self, pool_id: PoolId) -> Result<Option<StatusSnapshot>, MonitorError> {
        let row = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM pool_status WHERE pool_id = $1 \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        ))
        .bind(pool_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(snapshot_from_row).transpose()
    }

    async fn latest_batch(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<HashMap<PoolId, StatusSnapshot>, MonitorError> {
        if pool_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<i64> = pool_ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT DISTINCT ON (pool_id) {SNAPSHOT_COLUMNS} FROM pool_status \
             WHERE pool_id = ANY($1) ORDER BY pool_id, recorded_at DESC, id DESC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_all(rows)?
            .into_iter()
            .map(|s| (s.pool_id, s))
            .collect())
    }

    async fn range(
        &self,
        pool_id: PoolId,
        range: TimeRange,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM pool_status WHERE pool_id = $1 \
             AND ($2::BIGINT IS NULL OR recorded_at >= $2) \
             AND ($3::BIGINT IS NULL OR recorded_at <= $3) \
             ORDER BY recorded_at ASC, id ASC"
        ))
        .bind(pool_id.get())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn page(
        &self,
        pool_id: Option<PoolId>,
        range: TimeRange,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StatusSnapshot>, MonitorError> {
        let page_size = clamp_page_size(page_size);
        let filter = "($1::BIGINT IS NULL OR pool_id = $1) \
             AND ($2::BIGINT IS NULL OR recorded_at >= $2) \
             AND ($3::BIGINT IS NULL OR recorded_at <= $3)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM pool_status WHERE {filter}"
        ))
        .bind(pool_id.map(PoolId::get))
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM pool_status WHERE {filter} \
             ORDER BY recorded_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(pool_id.map(PoolId::get))
        .bind(range.start)
        .bind(range.end)
        .bind(i64::from(page_size))
        .bind(i64::from(page) * i64::from(page_size))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: convert_all(rows)?,
            total: u64::try_from(total).unwrap_or(0),
            page,
            page_size,
        })
    }

    async fn purge_older_than(&self, cutoff: i64) -> Result<u64, MonitorError> {
        let result = sqlx::query("DELETE FROM pool_status WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Configuration source backed by the `pool` and `virtual_pool` tables.
#[derive(Debug, Clone)]
pub struct PostgresConfigStore {
    pool: PgPool,
}

impl PostgresConfigStore {
    /// Creates a store on the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PoolConfigSource for PostgresConfigStore {
    async fn list_enabled_pools(&self) -> Result<Vec<PoolConfig>, MonitorError> {
        let rows = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {POOL_COLUMNS} FROM pool WHERE enabled ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(pool_from_row).collect()
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<PoolConfig>, MonitorError> {
        let row = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {POOL_COLUMNS} FROM pool WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(pool_from_row).transpose()
    }

    async fn list_enabled_virtual_pools(&self) -> Result<Vec<VirtualPoolConfig>, MonitorError> {
        let rows = sqlx::query_as::<_, VirtualPoolRow>(&format!(
            "SELECT {VIRTUAL_POOL_COLUMNS} FROM virtual_pool WHERE enabled \
             ORDER BY display_order, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(virtual_pool_from_row).collect()
    }

    async fn get_virtual_pool(
        &self,
        id: VirtualPoolId,
    ) -> Result<Option<VirtualPoolConfig>, MonitorError> {
        let row = sqlx::query_as::<_, VirtualPoolRow>(&format!(
            "SELECT {VIRTUAL_POOL_COLUMNS} FROM virtual_pool WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(virtual_pool_from_row).transpose()
    }

    async fn record_poll_result(
        &self,
        id: PoolId,
        result: &PollResult,
    ) -> Result<(), MonitorError> {
        let updated = sqlx::query(
            "UPDATE pool SET last_poll_status = $2, last_poll_error = $3, last_poll_at = $4 \
             WHERE id = $1",
        )
        .bind(id.get())
        .bind(result.status.as_str())
        .bind(result.error.as_deref())
        .bind(result.at_millis)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(MonitorError::PoolNotFound(id));
        }
        Ok(())
    }
}
