//! Row shapes of the `pool`, `virtual_pool` and `pool_status` tables and
//! their conversion into domain types.

use std::collections::BTreeMap;

use crate::domain::{
    AggregateStrategy, Counts, PollStatus, PoolConfig, PoolId, Pressure, ProviderConfig,
    SourceTag, StatusSnapshot, VirtualPoolConfig, VirtualPoolId,
};
use crate::error::MonitorError;

/// Column list matching [`SnapshotRow`].
pub const SNAPSHOT_COLUMNS: &str = "id, pool_id, valid_count, invalid_count, cooling_count, \
     total_count, pressure, recorded_at, source_tag, remarks, error_message, created_at";

/// A `pool_status` row.
pub type SnapshotRow = (
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    f64,
    i64,
    String,
    Option<String>,
    Option<String>,
    i64,
);

/// Column list matching [`PoolRow`].
pub const POOL_COLUMNS: &str = "id, name, provider_id, provider_config, poll_interval_secs, \
     enabled, last_poll_status, last_poll_error, last_poll_at";

/// A `pool` row.
pub type PoolRow = (
    i64,
    String,
    String,
    serde_json::Value,
    i64,
    bool,
    Option<String>,
    Option<String>,
    Option<i64>,
);

/// Column list matching [`VirtualPoolRow`].
pub const VIRTUAL_POOL_COLUMNS: &str =
    "id, name, pool_ids, strategy, weight_config, enabled, display_order";

/// A `virtual_pool` row.
pub type VirtualPoolRow = (
    i64,
    String,
    Vec<i64>,
    String,
    Option<serde_json::Value>,
    bool,
    i32,
);

fn corrupt(table: &str, id: i64, what: &str) -> MonitorError {
    MonitorError::Persistence(format!("{table} row {id}: {what}"))
}

/// Converts a `pool_status` row.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] if `source_tag` is unknown.
pub fn snapshot_from_row(row: SnapshotRow) -> Result<StatusSnapshot, MonitorError> {
    let (id, pool_id, valid, invalid, cooling, total, pressure, recorded_at, tag, remarks, error, created_at) =
        row;
    let source_tag: SourceTag = tag
        .parse()
        .map_err(|e: String| corrupt("pool_status", id, &e))?;
    Ok(StatusSnapshot {
        id,
        pool_id: PoolId::new(pool_id),
        counts: Counts::new(valid, invalid, cooling, total),
        pressure: Pressure::from_percent(pressure),
        recorded_at,
        source_tag,
        remarks,
        error,
        created_at,
    })
}

/// Converts a `pool` row.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] if `provider_config` is not a JSON
/// object or `last_poll_status` is unknown.
pub fn pool_from_row(row: PoolRow) -> Result<PoolConfig, MonitorError> {
    let (id, name, provider_id, config, interval, enabled, status, error, at) = row;
    let provider_config: ProviderConfig = match config {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => ProviderConfig::new(),
        _ => return Err(corrupt("pool", id, "provider_config is not an object")),
    };
    let last_poll_status = status
        .map(|s| s.parse::<PollStatus>())
        .transpose()
        .map_err(|e| corrupt("pool", id, &e))?;
    Ok(PoolConfig {
        id: PoolId::new(id),
        name,
        provider_id,
        provider_config,
        poll_interval_secs: u64::try_from(interval).unwrap_or(0),
        enabled,
        last_poll_status,
        last_poll_error: error,
        last_poll_at: at,
    })
}

/// Converts a `virtual_pool` row.
///
/// # Errors
///
/// Returns [`MonitorError::Persistence`] if `strategy` is unknown or
/// `weight_config` is not a map of pool ids to numbers.
pub fn virtual_pool_from_row(row: VirtualPoolRow) -> Result<VirtualPoolConfig, MonitorError> {
    let (id, name, pool_ids, strategy, weights, enabled, display_order) = row;
    let strategy: AggregateStrategy = strategy
        .parse()
        .map_err(|e: String| corrupt("virtual_pool", id, &e))?;
    let weight_config: BTreeMap<PoolId, f64> = match weights {
        None | Some(serde_json::Value::Null) => BTreeMap::new(),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| corrupt("virtual_pool", id, &format!("weight_config: {e}")))?,
    };
    Ok(VirtualPoolConfig {
        id: VirtualPoolId::new(id),
        name,
        member_pool_ids: pool_ids.into_iter().map(PoolId::new).collect(),
        strategy,
        weight_config,
        enabled,
        display_order,
    })
}
