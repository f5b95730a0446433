//! Monitor service: the facade every external surface talks to.
//!
//! [`MonitorService`] owns the orchestrator, the aggregation engine, the
//! connection health checker and the retention sweeper, and adds the
//! read-side views (overview, distribution, abnormal check) and manual
//! snapshot saves on top of the stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::config::MonitorConfig;
use crate::domain::{
    Counts, EventBus, MonitorEvent, NamedSnapshot, NewSnapshot, Page, PoolConfig, PoolId, Pressure,
    ProviderConfig, SeriesStatistics, SnapshotCandidate, SourceTag, StatusSnapshot, TimeRange,
    VirtualPoolConfig, VirtualPoolDraft, VirtualPoolId, now_millis,
};
use crate::error::MonitorError;
use crate::persistence::{PoolConfigSource, SnapshotStore};
use crate::provider::{ProviderDescriptor, ProviderRegistry};

use super::aggregation::{AggregatedStatus, AggregationEngine, StrategyInfo, ValidationResult};
use super::health::{ConnectionHealthChecker, ConnectionHealthReport};
use super::poller::{BatchReport, PollerSettings, PollingOrchestrator, TaskStatistics, UnitReport};
use super::retention::RetentionSweeper;

const ACTIVE_WINDOW_MILLIS: i64 = 3_600_000;
const ABNORMAL_PRESSURE: Pressure = Pressure::new(9_500);
const LOW_PRESSURE_CEILING: Pressure = Pressure::new(5_000);
const MEDIUM_PRESSURE_CEILING: Pressure = Pressure::new(8_000);

/// Facade settings derived from [`MonitorConfig`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Orchestrator width and deadline; the health checker uses the same.
    pub poller: PollerSettings,
    /// Pressure above which a pool is listed as high-pressure.
    pub high_pressure_threshold: Pressure,
    /// Age after which a latest snapshot counts as stale.
    pub stale_after: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poller: PollerSettings::default(),
            high_pressure_threshold: Pressure::new(8_000),
            stale_after: Duration::from_secs(300),
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poller: PollerSettings {
                max_concurrent: config.poll_max_concurrent,
                batch_deadline: config.batch_deadline(),
            },
            high_pressure_threshold: Pressure::from_percent(config.high_pressure_threshold),
            stale_after: Duration::from_secs(config.stale_after_secs),
        }
    }
}

/// A snapshot submitted by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ManualSnapshot {
    /// Measured pool; must exist.
    pub pool_id: PoolId,
    /// Counts, optional measurement time and remarks.
    #[serde(flatten)]
    pub candidate: SnapshotCandidate,
}

/// Summary of the latest snapshots of all enabled pools.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusOverview {
    /// Enabled pools.
    pub total_pools: usize,
    /// Enabled pools with a snapshot recorded in the last hour.
    pub active_pools: usize,
    /// Sum of the latest counts.
    #[serde(flatten)]
    pub counts: Counts,
    /// Mean stress pressure of the latest snapshots, 0 when none.
    pub average_pressure: Pressure,
    /// Pools above the high-pressure threshold.
    pub high_pressure_pools: usize,
    /// Threshold used.
    pub high_pressure_threshold: Pressure,
}

/// Latest snapshots bucketed by pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PressureDistribution {
    /// Pressure at most 50.
    pub low: usize,
    /// Pressure above 50 and at most 80.
    pub medium: usize,
    /// Pressure above 80.
    pub high: usize,
}

/// Result of the abnormal-status check for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AbnormalCheck {
    /// Checked pool.
    pub pool_id: PoolId,
    /// `true` if any reason applies.
    pub abnormal: bool,
    /// Why the pool is abnormal; empty when it is not.
    pub reasons: Vec<String>,
}

/// Result of an ad-hoc connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConnectionTest {
    /// Probed provider.
    pub provider_id: String,
    /// `true` if the backing system answered healthy.
    pub connected: bool,
    /// Probe duration.
    pub elapsed_ms: u64,
}

/// Result of an ad-hoc fetch that is not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FetchTest {
    /// Provider used.
    pub provider_id: String,
    /// Pool identity passed to the provider.
    pub pool_id: PoolId,
    /// What the provider returned.
    pub candidate: SnapshotCandidate,
    /// Stress pressure the snapshot would carry.
    pub pressure: Pressure,
    /// Fetch duration.
    pub elapsed_ms: u64,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Entry point for triggers, queries and diagnostics.
///
/// Cheap to clone; every component is shared.
#[derive(Debug, Clone)]
pub struct MonitorService {
    providers: Arc<ProviderRegistry>,
    snapshots: Arc<dyn SnapshotStore>,
    pools: Arc<dyn PoolConfigSource>,
    event_bus: EventBus,
    poller: PollingOrchestrator,
    aggregation: AggregationEngine,
    health: ConnectionHealthChecker,
    retention: RetentionSweeper,
    settings: MonitorSettings,
}

impl MonitorService {
    /// Wires every component over the given stores and registry.
    #[must_use]
    pub fn new(
        providers: Arc<ProviderRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        pools: Arc<dyn PoolConfigSource>,
        event_bus: EventBus,
        settings: MonitorSettings,
    ) -> Self {
        let poller = PollingOrchestrator::new(
            Arc::clone(&providers),
            Arc::clone(&snapshots),
            Arc::clone(&pools),
            event_bus.clone(),
            settings.poller,
        );
        let aggregation = AggregationEngine::new(Arc::clone(&snapshots), Arc::clone(&pools));
        let health = ConnectionHealthChecker::new(
            Arc::clone(&providers),
            Arc::clone(&pools),
            settings.poller.max_concurrent,
            settings.poller.batch_deadline,
        );
        let retention = RetentionSweeper::new(Arc::clone(&snapshots), event_bus.clone());
        Self {
            providers,
            snapshots,
            pools,
            event_bus,
            poller,
            aggregation,
            health,
            retention,
            settings,
        }
    }

    /// The event bus snapshots and batches are published on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// The polling orchestrator, for the background loop.
    #[must_use]
    pub fn poller(&self) -> &PollingOrchestrator {
        &self.poller
    }

    /// The connection health checker, for the background loop.
    #[must_use]
    pub fn health_checker(&self) -> &ConnectionHealthChecker {
        &self.health
    }

    /// The retention sweeper, for the background loop.
    #[must_use]
    pub fn retention(&self) -> &RetentionSweeper {
        &self.retention
    }

    // -- triggers --

    /// Runs one batch over every enabled pool now.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the pool list cannot be read.
    pub async fn poll_all_now(&self) -> Result<BatchReport, MonitorError> {
        self.poller.poll_all().await
    }

    /// Polls a single pool now.
    ///
    /// # Errors
    ///
    /// See [`PollingOrchestrator::poll_one`].
    pub async fn poll_one(&self, pool_id: PoolId) -> Result<UnitReport, MonitorError> {
        self.poller.poll_one(pool_id).await
    }

    /// Orchestrator state for operators.
    pub async fn task_statistics(&self) -> TaskStatistics {
        self.poller.task_statistics().await
    }

    // -- snapshot queries --

    /// Latest snapshot of a pool, `None` if it has no data.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn latest_status(
        &self,
        pool_id: PoolId,
    ) -> Result<Option<StatusSnapshot>, MonitorError> {
        self.snapshots.latest(pool_id).await
    }

    /// Latest snapshot of each listed pool; pools without data are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn latest_statuses(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<HashMap<PoolId, StatusSnapshot>, MonitorError> {
        self.snapshots.latest_batch(pool_ids).await
    }

    /// Latest snapshot of every enabled pool that has data, with the pool
    /// name, ascending by pool id.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn latest_all_enabled(&self) -> Result<Vec<NamedSnapshot>, MonitorError> {
        let pools = self.pools.list_enabled_pools().await?;
        self.latest_of(pools).await
    }

    /// Latest snapshot of each given pool that has data, with its name.
    async fn latest_of(&self, pools: Vec<PoolConfig>) -> Result<Vec<NamedSnapshot>, MonitorError> {
        let ids: Vec<PoolId> = pools.iter().map(|p| p.id).collect();
        let mut latest = self.snapshots.latest_batch(&ids).await?;
        Ok(pools
            .into_iter()
            .filter_map(|pool| {
                latest.remove(&pool.id).map(|snapshot| NamedSnapshot {
                    pool_name: pool.name,
                    snapshot,
                })
            })
            .collect())
    }

    /// Paged history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for an inverted range, or
    /// [`MonitorError::Persistence`] on storage failure.
    pub async fn status_history(
        &self,
        pool_id: Option<PoolId>,
        range: TimeRange,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StatusSnapshot>, MonitorError> {
        check_range(range)?;
        self.snapshots.page(pool_id, range, page, page_size).await
    }

    /// Decimated ascending series.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for an inverted range, or
    /// [`MonitorError::Persistence`] on storage failure.
    pub async fn status_trend(
        &self,
        pool_id: PoolId,
        range: TimeRange,
        interval_secs: Option<i64>,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        check_range(range)?;
        self.snapshots.trend(pool_id, range, interval_secs).await
    }

    /// Range statistics.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for an inverted range, or
    /// [`MonitorError::Persistence`] on storage failure.
    pub async fn status_statistics(
        &self,
        pool_id: PoolId,
        range: TimeRange,
    ) -> Result<SeriesStatistics, MonitorError> {
        check_range(range)?;
        self.snapshots.statistics(pool_id, range).await
    }

    /// Overview of the latest snapshots of enabled pools.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn overview(&self) -> Result<StatusOverview, MonitorError> {
        let pools = self.pools.list_enabled_pools().await?;
        let total_pools = pools.len();
        let latest = self.latest_of(pools).await?;
        let active_since = now_millis().saturating_sub(ACTIVE_WINDOW_MILLIS);
        let threshold = self.settings.high_pressure_threshold;

        Ok(StatusOverview {
            total_pools,
            active_pools: latest
                .iter()
                .filter(|s| s.snapshot.recorded_at >= active_since)
                .count(),
            counts: latest
                .iter()
                .fold(Counts::default(), |acc, s| acc.saturating_add(s.snapshot.counts)),
            average_pressure: Pressure::mean(latest.iter().map(|s| s.snapshot.pressure))
                .unwrap_or(Pressure::ZERO),
            high_pressure_pools: latest
                .iter()
                .filter(|s| s.snapshot.pressure > threshold)
                .count(),
            high_pressure_threshold: threshold,
        })
    }

    /// Latest snapshots above `threshold` (default: configured), highest
    /// pressure first.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn high_pressure(
        &self,
        threshold: Option<Pressure>,
    ) -> Result<Vec<NamedSnapshot>, MonitorError> {
        let threshold = threshold.unwrap_or(self.settings.high_pressure_threshold);
        let mut high: Vec<NamedSnapshot> = self
            .latest_all_enabled()
            .await?
            .into_iter()
            .filter(|s| s.snapshot.pressure > threshold)
            .collect();
        high.sort_by(|a, b| {
            b.snapshot
                .pressure
                .cmp(&a.snapshot.pressure)
                .then(a.snapshot.pool_id.cmp(&b.snapshot.pool_id))
        });
        Ok(high)
    }

    /// Latest snapshots of enabled pools bucketed by pressure.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn pressure_distribution(&self) -> Result<PressureDistribution, MonitorError> {
        let latest = self.latest_all_enabled().await?;
        Ok(latest
            .iter()
            .fold(PressureDistribution::default(), |mut dist, s| {
                match s.snapshot.pressure {
                    p if p <= LOW_PRESSURE_CEILING => dist.low += 1,
                    p if p <= MEDIUM_PRESSURE_CEILING => dist.medium += 1,
                    _ => dist.high += 1,
                }
                dist
            }))
    }

    /// Flags a pool with no data, stale data, pressure above 95 or no
    /// valid resources.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn abnormal(&self, pool_id: PoolId) -> Result<AbnormalCheck, MonitorError> {
        let reasons = match self.snapshots.latest(pool_id).await? {
            None => vec!["no snapshot recorded".to_string()],
            Some(snapshot) => {
                let stale_after =
                    i64::try_from(self.settings.stale_after.as_millis()).unwrap_or(i64::MAX);
                let age = now_millis().saturating_sub(snapshot.recorded_at);
                let mut reasons = Vec::new();
                if age > stale_after {
                    reasons.push(format!("latest snapshot is {}s old", age / 1_000));
                }
                if snapshot.pressure > ABNORMAL_PRESSURE {
                    reasons.push(format!("pressure {} above {ABNORMAL_PRESSURE}", snapshot.pressure));
                }
                if snapshot.counts.valid_count <= 0 {
                    reasons.push("no valid resources".to_string());
                }
                reasons
            }
        };
        Ok(AbnormalCheck {
            pool_id,
            abnormal: !reasons.is_empty(),
            reasons,
        })
    }

    // -- manual writes --

    async fn prepare_manual(&self, manual: ManualSnapshot) -> Result<NewSnapshot, MonitorError> {
        if self.pools.get_pool(manual.pool_id).await?.is_none() {
            return Err(MonitorError::PoolNotFound(manual.pool_id));
        }
        let candidate = manual
            .candidate
            .validate()
            .map_err(|e| MonitorError::InvalidRequest(e.to_string()))?;
        Ok(NewSnapshot::from_candidate(
            manual.pool_id,
            candidate,
            SourceTag::Manual,
            now_millis(),
        ))
    }

    fn announce(&self, snapshot: &StatusSnapshot) {
        let _ = self.event_bus.publish(MonitorEvent::SnapshotRecorded {
            pool_id: snapshot.pool_id,
            snapshot_id: snapshot.id,
            pressure: snapshot.pressure,
            is_error: snapshot.is_error(),
            timestamp: Utc::now(),
        });
    }

    /// Stores an operator-supplied snapshot. Pressure is always derived
    /// from the counts.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PoolNotFound`] for an unknown pool,
    /// [`MonitorError::InvalidRequest`] for negative counts, or
    /// [`MonitorError::Persistence`] on storage failure.
    pub async fn save_manual(&self, manual: ManualSnapshot) -> Result<StatusSnapshot, MonitorError> {
        let prepared = self.prepare_manual(manual).await?;
        let saved = self.snapshots.append(prepared).await?;
        tracing::info!(pool_id = %saved.pool_id, snapshot_id = saved.id, "manual snapshot saved");
        self.announce(&saved);
        Ok(saved)
    }

    /// Stores several operator-supplied snapshots. Nothing is stored if
    /// any entry is rejected.
    ///
    /// # Errors
    ///
    /// As [`Self::save_manual`]; additionally
    /// [`MonitorError::InvalidRequest`] for an empty batch.
    pub async fn save_manual_batch(
        &self,
        batch: Vec<ManualSnapshot>,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        if batch.is_empty() {
            return Err(MonitorError::InvalidRequest(
                "snapshot batch is empty".to_string(),
            ));
        }
        let mut prepared = Vec::with_capacity(batch.len());
        for manual in batch {
            prepared.push(self.prepare_manual(manual).await?);
        }
        let saved = self.snapshots.append_batch(prepared).await?;
        tracing::info!(count = saved.len(), "manual snapshot batch saved");
        for snapshot in &saved {
            self.announce(snapshot);
        }
        Ok(saved)
    }

    /// Deletes snapshots older than `retention_days` days.
    ///
    /// # Errors
    ///
    /// See [`RetentionSweeper::purge_expired`].
    pub async fn purge_expired(&self, retention_days: u32) -> Result<u64, MonitorError> {
        self.retention.purge_expired(retention_days).await
    }

    // -- virtual pools --

    /// Aggregated status of one virtual pool.
    ///
    /// # Errors
    ///
    /// See [`AggregationEngine::aggregated_status`].
    pub async fn aggregated_status(
        &self,
        id: VirtualPoolId,
    ) -> Result<AggregatedStatus, MonitorError> {
        self.aggregation.aggregated_status(id).await
    }

    /// Aggregated status of every enabled virtual pool.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn all_aggregated_statuses(&self) -> Result<Vec<AggregatedStatus>, MonitorError> {
        self.aggregation.all_aggregated_statuses().await
    }

    /// Validates a candidate virtual pool.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn validate_virtual_pool(
        &self,
        draft: &VirtualPoolDraft,
    ) -> Result<ValidationResult, MonitorError> {
        self.aggregation.validate(draft).await
    }

    /// Previews a candidate virtual pool without persisting it.
    ///
    /// # Errors
    ///
    /// See [`AggregationEngine::preview`].
    pub async fn preview_virtual_pool(
        &self,
        draft: &VirtualPoolDraft,
    ) -> Result<AggregatedStatus, MonitorError> {
        self.aggregation.preview(draft).await
    }

    /// Supported aggregation strategies.
    #[must_use]
    pub fn strategies(&self) -> Vec<StrategyInfo> {
        AggregationEngine::strategies()
    }

    /// Enabled virtual pools that include `pool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn virtual_pools_containing(
        &self,
        pool_id: PoolId,
    ) -> Result<Vec<VirtualPoolConfig>, MonitorError> {
        self.aggregation.containing(pool_id).await
    }

    // -- connectivity and providers --

    /// Last connection health report, running a check if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the pool list cannot be read.
    pub async fn connection_health(&self) -> Result<ConnectionHealthReport, MonitorError> {
        self.health.connection_health().await
    }

    /// Registered providers.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.providers.list()
    }

    /// Probes a provider with an ad-hoc configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ProviderNotFound`] for an unknown provider,
    /// or [`MonitorError::Provider`] if the probe could not run.
    pub async fn test_connection(
        &self,
        provider_id: &str,
        config: &ProviderConfig,
    ) -> Result<ConnectionTest, MonitorError> {
        let provider = self.providers.get(provider_id)?;
        let started = Instant::now();
        let connected = provider.check_connection(config).await?;
        tracing::debug!(provider_id, connected, "connection test finished");
        Ok(ConnectionTest {
            provider_id: provider_id.to_string(),
            connected,
            elapsed_ms: elapsed_ms(started),
        })
    }

    /// Fetches through a provider without recording anything.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ProviderNotFound`] for an unknown provider,
    /// or [`MonitorError::Provider`] if the fetch failed.
    pub async fn test_fetch(
        &self,
        provider_id: &str,
        pool_id: PoolId,
        pool_name: &str,
        config: &ProviderConfig,
    ) -> Result<FetchTest, MonitorError> {
        let provider = self.providers.get(provider_id)?;
        let started = Instant::now();
        let candidate = provider
            .fetch_status(pool_id, pool_name, config)
            .await?
            .validate()?;
        Ok(FetchTest {
            provider_id: provider_id.to_string(),
            pool_id,
            pressure: Pressure::stress(&candidate.counts),
            candidate,
            elapsed_ms: elapsed_ms(started),
        })
    }
}

fn check_range(range: TimeRange) -> Result<(), MonitorError> {
    match (range.start, range.end) {
        (Some(start), Some(end)) if start > end => Err(MonitorError::InvalidRequest(format!(
            "start {start} is after end {end}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::PollResult;
    use crate::persistence::{InMemoryConfigStore, InMemorySnapshotStore};
    use crate::provider::MockProvider;

    async fn service() -> (MonitorService, Arc<InMemoryConfigStore>) {
        let pools = Arc::new(InMemoryConfigStore::new());
        for (id, name) in [(1, "alpha"), (2, "beta"), (3, "gamma")] {
            pools
                .upsert_pool(PoolConfig::new(PoolId::new(id), name, "mock"))
                .await;
        }
        let providers = Arc::new(ProviderRegistry::new());
        let _ = providers.register("mock", Arc::new(MockProvider::new()));
        let service = MonitorService::new(
            providers,
            Arc::new(InMemorySnapshotStore::new()),
            Arc::clone(&pools) as Arc<dyn PoolConfigSource>,
            EventBus::new(64),
            MonitorSettings::default(),
        );
        (service, pools)
    }

    fn manual(pool: i64, counts: Counts) -> ManualSnapshot {
        ManualSnapshot {
            pool_id: PoolId::new(pool),
            candidate: SnapshotCandidate::new(counts),
        }
    }

    #[tokio::test]
    async fn manual_save_derives_pressure_and_tags_source() {
        let (service, _) = service().await;
        let mut events = service.event_bus().subscribe();
        let Ok(saved) = service.save_manual(manual(1, Counts::new(10, 2, 1, 13))).await else {
            panic!("save failed");
        };
        assert_eq!(saved.source_tag, SourceTag::Manual);
        assert_eq!(saved.pressure.to_string(), "23.08");
        assert!(matches!(
            events.try_recv(),
            Ok(MonitorEvent::SnapshotRecorded { is_error: false, .. })
        ));
    }

    #[tokio::test]
    async fn manual_save_rejects_unknown_pool_and_negative_counts() {
        let (service, _) = service().await;
        assert!(matches!(
            service.save_manual(manual(99, Counts::new(1, 0, 0, 1))).await,
            Err(MonitorError::PoolNotFound(_))
        ));
        assert!(matches!(
            service.save_manual(manual(1, Counts::new(-1, 0, 0, 1))).await,
            Err(MonitorError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn manual_batch_is_all_or_nothing() {
        let (service, _) = service().await;
        let result = service
            .save_manual_batch(vec![
                manual(1, Counts::new(1, 0, 0, 1)),
                manual(42, Counts::new(1, 0, 0, 1)),
            ])
            .await;
        assert!(matches!(result, Err(MonitorError::PoolNotFound(_))));
        assert!(service.latest_status(PoolId::new(1)).await.is_ok_and(|s| s.is_none()));
    }

    #[tokio::test]
    async fn overview_distribution_and_high_pressure() {
        let (service, _) = service().await;
        // stress 10%, 60%, 90%
        for (pool, counts) in [
            (1, Counts::new(90, 10, 0, 100)),
            (2, Counts::new(40, 50, 10, 100)),
            (3, Counts::new(10, 80, 10, 100)),
        ] {
            let _ = service.save_manual(manual(pool, counts)).await;
        }

        let Ok(overview) = service.overview().await else {
            panic!("overview failed");
        };
        assert_eq!(overview.total_pools, 3);
        assert_eq!(overview.active_pools, 3);
        assert_eq!(overview.counts, Counts::new(140, 140, 20, 300));
        assert_eq!(overview.average_pressure.to_string(), "53.33");
        assert_eq!(overview.high_pressure_pools, 1);

        let Ok(dist) = service.pressure_distribution().await else {
            panic!("distribution failed");
        };
        assert_eq!(dist, PressureDistribution { low: 1, medium: 1, high: 1 });

        let Ok(high) = service.high_pressure(Some(Pressure::from_percent(50.0))).await else {
            panic!("high pressure failed");
        };
        let names: Vec<&str> = high.iter().map(|s| s.pool_name.as_str()).collect();
        assert_eq!(names, ["gamma", "beta"]);
    }

    #[tokio::test]
    async fn abnormal_reasons() {
        let (service, _) = service().await;
        let Ok(check) = service.abnormal(PoolId::new(1)).await else {
            panic!("check failed");
        };
        assert!(check.abnormal);

        let _ = service.save_manual(manual(1, Counts::new(50, 1, 0, 51))).await;
        let Ok(check) = service.abnormal(PoolId::new(1)).await else {
            panic!("check failed");
        };
        assert!(!check.abnormal, "{:?}", check.reasons);

        let stale = ManualSnapshot {
            pool_id: PoolId::new(2),
            candidate: SnapshotCandidate {
                recorded_at: Some(now_millis() - 3_600_000),
                ..SnapshotCandidate::new(Counts::new(0, 10, 0, 10))
            },
        };
        let _ = service.save_manual(stale).await;
        let Ok(check) = service.abnormal(PoolId::new(2)).await else {
            panic!("check failed");
        };
        assert_eq!(check.reasons.len(), 3, "{:?}", check.reasons);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let (service, _) = service().await;
        assert!(matches!(
            service
                .status_trend(PoolId::new(1), TimeRange::new(Some(10), Some(5)), None)
                .await,
            Err(MonitorError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn ad_hoc_provider_calls() {
        let (service, _) = service().await;
        let mut config = ProviderConfig::new();
        config.insert("latency_ms".to_string(), serde_json::json!(0));

        let Ok(fetched) = service
            .test_fetch("mock", PoolId::new(7), "adhoc", &config)
            .await
        else {
            panic!("fetch failed");
        };
        assert!(fetched.candidate.counts.is_consistent());
        assert!(service.latest_status(PoolId::new(7)).await.is_ok_and(|s| s.is_none()));

        assert!(matches!(
            service.test_connection("ldap", &config).await,
            Err(MonitorError::ProviderNotFound(_))
        ));
        assert_eq!(service.providers().len(), 1);
    }

    /// Lists one more enabled pool on every call, as if an operator kept
    /// enabling pools.
    #[derive(Debug)]
    struct GrowingPools {
        inner: InMemoryConfigStore,
        listed: AtomicUsize,
    }

    #[async_trait]
    impl PoolConfigSource for GrowingPools {
        async fn list_enabled_pools(&self) -> Result<Vec<PoolConfig>, MonitorError> {
            let visible = self.listed.fetch_add(1, Ordering::SeqCst) + 1;
            let mut pools = self.inner.list_enabled_pools().await?;
            pools.truncate(visible);
            Ok(pools)
        }

        async fn get_pool(&self, id: PoolId) -> Result<Option<PoolConfig>, MonitorError> {
            self.inner.get_pool(id).await
        }

        async fn list_enabled_virtual_pools(
            &self,
        ) -> Result<Vec<VirtualPoolConfig>, MonitorError> {
            self.inner.list_enabled_virtual_pools().await
        }

        async fn get_virtual_pool(
            &self,
            id: VirtualPoolId,
        ) -> Result<Option<VirtualPoolConfig>, MonitorError> {
            self.inner.get_virtual_pool(id).await
        }

        async fn record_poll_result(
            &self,
            id: PoolId,
            result: &PollResult,
        ) -> Result<(), MonitorError> {
            self.inner.record_poll_result(id, result).await
        }
    }

    #[tokio::test]
    async fn overview_reads_the_pool_list_once() {
        let inner = InMemoryConfigStore::new();
        for id in 1..=3 {
            inner
                .upsert_pool(PoolConfig::new(PoolId::new(id), format!("pool-{id}"), "mock"))
                .await;
        }
        let pools = Arc::new(GrowingPools {
            inner,
            listed: AtomicUsize::new(0),
        });
        let service = MonitorService::new(
            Arc::new(ProviderRegistry::new()),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::clone(&pools) as Arc<dyn PoolConfigSource>,
            EventBus::new(8),
            MonitorSettings::default(),
        );
        for id in 1..=3 {
            assert!(service.save_manual(manual(id, Counts::new(5, 0, 0, 5))).await.is_ok());
        }
        pools.listed.store(0, Ordering::SeqCst);

        let Ok(overview) = service.overview().await else {
            panic!("overview failed");
        };
        assert_eq!(overview.total_pools, 1);
        assert_eq!(overview.active_pools, 1);
        assert_eq!(overview.counts, Counts::new(5, 0, 0, 5));
        assert_eq!(pools.listed.load(Ordering::SeqCst), 1);
    }
}
