//! Events published while the monitor records data.
//!
//! Every recorded snapshot, finished batch and retention purge emits a
//! [`MonitorEvent`] through the [`super::EventBus`]. WebSocket clients
//! receive them filtered by their pool subscriptions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{PoolId, Pressure};

/// Event emitted after a state change in the monitor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A snapshot was appended for a pool.
    SnapshotRecorded {
        /// Measured pool.
        pool_id: PoolId,
        /// Store key of the new snapshot.
        snapshot_id: i64,
        /// Stress pressure of the snapshot.
        pressure: Pressure,
        /// `true` for zero-filled error snapshots.
        is_error: bool,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },

    /// A polling batch reached a terminal outcome.
    BatchFinished {
        /// Terminal outcome (`done`, `partial_failure`, `timed_out`).
        outcome: String,
        /// Units submitted.
        total: usize,
        /// Units that recorded a measurement.
        succeeded: usize,
        /// Units that recorded an error snapshot.
        failed: usize,
        /// Units still running at the deadline.
        abandoned: usize,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },

    /// The retention sweep removed old snapshots.
    SnapshotsPurged {
        /// Cutoff in epoch milliseconds; older snapshots were removed.
        cutoff: i64,
        /// Rows removed.
        deleted: u64,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Returns the pool this event concerns, if it concerns exactly one.
    #[must_use]
    pub const fn pool_id(&self) -> Option<PoolId> {
        match self {
            Self::SnapshotRecorded { pool_id, .. } => Some(*pool_id),
            Self::BatchFinished { .. } | Self::SnapshotsPurged { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SnapshotRecorded { .. } => "snapshot_recorded",
            Self::BatchFinished { .. } => "batch_finished",
            Self::SnapshotsPurged { .. } => "snapshots_purged",
        }
    }
}
