//! Retention sweep: hard-deletes snapshots older than the horizon.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::domain::{EventBus, MonitorEvent, now_millis};
use crate::error::MonitorError;
use crate::persistence::SnapshotStore;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Purges old snapshots on demand and on a timer.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    snapshots: Arc<dyn SnapshotStore>,
    event_bus: EventBus,
}

impl RetentionSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(snapshots: Arc<dyn SnapshotStore>, event_bus: EventBus) -> Self {
        Self {
            snapshots,
            event_bus,
        }
    }

    /// Deletes snapshots recorded more than `retention_days` days ago and
    /// returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] if `retention_days` is 0,
    /// or [`MonitorError::Persistence`] on storage failure.
    pub async fn purge_expired(&self, retention_days: u32) -> Result<u64, MonitorError> {
        if retention_days == 0 {
            return Err(MonitorError::InvalidRequest(
                "retention_days must be at least 1".to_string(),
            ));
        }
        let cutoff = now_millis().saturating_sub(i64::from(retention_days) * MILLIS_PER_DAY);
        self.purge_before(cutoff).await
    }

    /// Deletes snapshots with `recorded_at < cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn purge_before(&self, cutoff: i64) -> Result<u64, MonitorError> {
        let deleted = self.snapshots.purge_older_than(cutoff).await?;
        tracing::info!(cutoff, deleted, "expired snapshots purged");
        let _ = self.event_bus.publish(MonitorEvent::SnapshotsPurged {
            cutoff,
            deleted,
            timestamp: Utc::now(),
        });
        Ok(deleted)
    }

    /// Sweeps every `period` until shutdown. A zero retention disables the
    /// loop.
    pub async fn run(
        self,
        retention_days: u32,
        period: Duration,
        shutdown: broadcast::Receiver<()>,
    ) {
        if retention_days == 0 {
            tracing::info!("retention sweep disabled");
            return;
        }
        super::shutdown::every("retention", period, shutdown, || {
            let sweeper = self.clone();
            async move {
                if let Err(e) = sweeper.purge_expired(retention_days).await {
                    tracing::error!(error = %e, "retention sweep failed");
                }
            }
        })
        .await;
    }
}
