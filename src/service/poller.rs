//! Polling orchestrator: fans out fetch-and-record units over a bounded
//! worker pool.
//!
//! A batch moves through `Idle -> FanningOut -> Awaiting` and ends in one
//! of [`BatchOutcome::Done`], [`BatchOutcome::PartialFailure`] or
//! [`BatchOutcome::TimedOut`] before returning to `Idle`. Each unit is
//! independent: fetch, then append, then write back. Provider failures are
//! recorded as zero-filled error snapshots and never abort the batch.
//!
//! The semaphore bounding concurrent provider calls is shared by timer
//! batches and manual triggers. Units still running at the batch deadline
//! are detached, not aborted, and record their results whenever they
//! finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::domain::{
    EventBus, MonitorEvent, NewSnapshot, PollResult, PollStatus, PoolConfig, PoolId, SourceTag,
    StatusSnapshot, now_millis,
};
use crate::error::{MonitorError, ProviderError};
use crate::persistence::{PoolConfigSource, SnapshotStore};
use crate::provider::ProviderRegistry;

/// Where the orchestrator is in its batch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// No batch running.
    Idle,
    /// Units are being submitted.
    FanningOut,
    /// Waiting for submitted units or the deadline.
    Awaiting,
}

impl BatchPhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::FanningOut,
            2 => Self::Awaiting,
            _ => Self::Idle,
        }
    }
}

/// Terminal outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// No enabled pools; nothing was submitted.
    Idle,
    /// Every unit recorded a measurement before the deadline.
    Done,
    /// Every unit finished before the deadline, at least one failed.
    PartialFailure,
    /// The deadline passed with units still running.
    TimedOut,
}

impl BatchOutcome {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Done => "done",
            Self::PartialFailure => "partial_failure",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Summary of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchReport {
    /// Terminal outcome.
    pub outcome: BatchOutcome,
    /// Units submitted.
    pub total: usize,
    /// Units that recorded a measurement before the deadline.
    pub succeeded: usize,
    /// Units that finished with a failure before the deadline.
    pub failed: usize,
    /// Units still running at the deadline.
    pub abandoned: usize,
    /// Batch start time.
    pub started_at: DateTime<Utc>,
    /// Wall time spent waiting for the batch.
    pub elapsed_ms: u64,
}

/// Result of one fetch-and-record unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UnitReport {
    /// Polled pool.
    pub pool_id: PoolId,
    /// Pool display name.
    pub pool_name: String,
    /// Status written back to the pool.
    pub status: PollStatus,
    /// The recorded snapshot, absent if the store rejected it.
    pub snapshot: Option<StatusSnapshot>,
    /// Provider or storage failure, if any.
    pub error: Option<String>,
    /// Time spent in the unit, excluding the wait for a worker.
    pub elapsed_ms: u64,
}

impl UnitReport {
    /// Returns `true` if the provider answered and the snapshot was stored.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, PollStatus::Success) && self.snapshot.is_some()
    }
}

/// A unit's report plus the provider error that caused a failure.
#[derive(Debug)]
struct UnitOutcome {
    report: UnitReport,
    provider_error: Option<ProviderError>,
}

/// Point-in-time view of the orchestrator for operators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskStatistics {
    /// Size of the worker pool.
    pub worker_width: usize,
    /// Workers currently free.
    pub available_workers: usize,
    /// Units currently holding a worker, abandoned ones included.
    pub in_flight: usize,
    /// Current batch phase.
    pub phase: BatchPhase,
    /// Batches that submitted at least one unit since start.
    pub batches_run: u64,
    /// Batch deadline in seconds.
    pub batch_deadline_secs: u64,
    /// Report of the most recent batch.
    pub last_batch: Option<BatchReport>,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    /// Concurrent provider calls.
    pub max_concurrent: usize,
    /// How long a batch waits for its units.
    pub batch_deadline: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            batch_deadline: Duration::from_secs(30),
        }
    }
}

/// Decrements the in-flight counter when a unit ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Inner {
    providers: Arc<ProviderRegistry>,
    snapshots: Arc<dyn SnapshotStore>,
    pools: Arc<dyn PoolConfigSource>,
    event_bus: EventBus,
    workers: Arc<Semaphore>,
    width: usize,
    batch_deadline: Duration,
    batch_gate: Mutex<()>,
    phase: AtomicU8,
    in_flight: AtomicUsize,
    batches_run: AtomicU64,
    last_batch: RwLock<Option<BatchReport>>,
}

/// Runs polling batches and single-pool polls.
///
/// Cheap to clone; clones share the worker pool and batch state.
#[derive(Debug, Clone)]
pub struct PollingOrchestrator {
    inner: Arc<Inner>,
}

impl PollingOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        providers: Arc<ProviderRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        pools: Arc<dyn PoolConfigSource>,
        event_bus: EventBus,
        settings: PollerSettings,
    ) -> Self {
        let width = settings.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                providers,
                snapshots,
                pools,
                event_bus,
                workers: Arc::new(Semaphore::new(width)),
                width,
                batch_deadline: settings.batch_deadline,
                batch_gate: Mutex::new(()),
                phase: AtomicU8::new(BatchPhase::Idle as u8),
                in_flight: AtomicUsize::new(0),
                batches_run: AtomicU64::new(0),
                last_batch: RwLock::new(None),
            }),
        }
    }

    /// Polls every enabled pool once.
    ///
    /// Concurrent calls are serialised; the second waits for the first
    /// batch to finish.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] only if the enabled pool list
    /// cannot be read. Per-pool failures are reported in the batch.
    pub async fn poll_all(&self) -> Result<BatchReport, MonitorError> {
        let _gate = self.inner.batch_gate.lock().await;
        let pools = self.inner.pools.list_enabled_pools().await?;
        let started_at = Utc::now();
        if pools.is_empty() {
            tracing::debug!("no enabled pools, batch skipped");
            return Ok(BatchReport {
                outcome: BatchOutcome::Idle,
                total: 0,
                succeeded: 0,
                failed: 0,
                abandoned: 0,
                started_at,
                elapsed_ms: 0,
            });
        }

        let clock = Instant::now();
        let deadline = clock + self.inner.batch_deadline;
        tracing::info!(pools = pools.len(), "polling batch started");

        self.set_phase(BatchPhase::FanningOut);
        let mut units = JoinSet::new();
        for pool in pools {
            let inner = Arc::clone(&self.inner);
            units.spawn(async move { inner.run_unit(pool).await });
        }
        let total = units.len();

        self.set_phase(BatchPhase::Awaiting);
        let mut succeeded = 0_usize;
        let mut failed = 0_usize;
        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline, units.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    if outcome.report.is_success() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                }
                Ok(Some(Err(join_err))) => {
                    tracing::error!(error = %join_err, "polling unit panicked");
                    failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        let abandoned = units.len();
        if abandoned > 0 {
            // let stragglers finish and record on their own
            units.detach_all();
        }

        let outcome = if timed_out && abandoned > 0 {
            BatchOutcome::TimedOut
        } else if failed > 0 {
            BatchOutcome::PartialFailure
        } else {
            BatchOutcome::Done
        };
        let report = BatchReport {
            outcome,
            total,
            succeeded,
            failed,
            abandoned,
            started_at,
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        self.set_phase(BatchPhase::Idle);
        self.inner.batches_run.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_batch.write().await = Some(report.clone());

        match outcome {
            BatchOutcome::TimedOut => tracing::warn!(
                total,
                succeeded,
                failed,
                abandoned,
                elapsed_ms = report.elapsed_ms,
                "polling batch timed out"
            ),
            _ => tracing::info!(
                outcome = outcome.as_str(),
                total,
                succeeded,
                failed,
                elapsed_ms = report.elapsed_ms,
                "polling batch finished"
            ),
        }
        let _ = self.inner.event_bus.publish(MonitorEvent::BatchFinished {
            outcome: outcome.as_str().to_string(),
            total,
            succeeded,
            failed,
            abandoned,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    /// Polls a single pool, waiting for a free worker.
    ///
    /// A provider failure is still a successful call: the error snapshot
    /// is recorded and described in the returned report.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::PoolNotFound`] if the pool does not exist.
    /// - [`MonitorError::PoolDisabled`] if the pool is disabled.
    /// - [`MonitorError::ProviderNotFound`] if its provider is not
    ///   registered; the failure is still recorded on the pool.
    /// - [`MonitorError::Persistence`] if the pool cannot be read.
    pub async fn poll_one(&self, pool_id: PoolId) -> Result<UnitReport, MonitorError> {
        let pool = self
            .inner
            .pools
            .get_pool(pool_id)
            .await?
            .ok_or(MonitorError::PoolNotFound(pool_id))?;
        if !pool.enabled {
            return Err(MonitorError::PoolDisabled(pool_id));
        }
        let outcome = Arc::clone(&self.inner).run_unit(pool).await;
        match outcome.provider_error {
            Some(ProviderError::NotFound(id)) => Err(MonitorError::ProviderNotFound(id)),
            _ => Ok(outcome.report),
        }
    }

    /// Current orchestrator state.
    pub async fn task_statistics(&self) -> TaskStatistics {
        TaskStatistics {
            worker_width: self.inner.width,
            available_workers: self.inner.workers.available_permits(),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
            phase: self.phase(),
            batches_run: self.inner.batches_run.load(Ordering::Relaxed),
            batch_deadline_secs: self.inner.batch_deadline.as_secs(),
            last_batch: self.inner.last_batch.read().await.clone(),
        }
    }

    /// Current batch phase.
    #[must_use]
    pub fn phase(&self) -> BatchPhase {
        BatchPhase::from_u8(self.inner.phase.load(Ordering::SeqCst))
    }

    /// Runs a batch every `period` until shutdown.
    pub async fn run(self, period: Duration, shutdown: broadcast::Receiver<()>) {
        super::shutdown::every("polling", period, shutdown, || {
            let orchestrator = self.clone();
            async move {
                if let Err(e) = orchestrator.poll_all().await {
                    tracing::error!(error = %e, "polling batch could not start");
                }
            }
        })
        .await;
    }

    fn set_phase(&self, phase: BatchPhase) {
        self.inner.phase.store(phase as u8, Ordering::SeqCst);
    }
}

impl Inner {
    /// Fetch, append, write back. Never fails; every problem ends up in
    /// the report.
    async fn run_unit(self: Arc<Self>, pool: PoolConfig) -> UnitOutcome {
        let Ok(_worker) = Arc::clone(&self.workers).acquire_owned().await else {
            return self.abort_unit(pool);
        };
        let _in_flight = InFlight::enter(&self.in_flight);
        let clock = Instant::now();

        let fetched = match self.providers.get(&pool.provider_id) {
            Ok(provider) => provider
                .fetch_status(pool.id, &pool.name, &pool.provider_config)
                .await
                .and_then(|candidate| candidate.validate()),
            Err(e) => Err(e),
        };
        let now = now_millis();

        let (snapshot, poll_result, provider_error) = match fetched {
            Ok(candidate) => {
                tracing::debug!(pool_id = %pool.id, counts = ?candidate.counts, "pool polled");
                (
                    NewSnapshot::from_candidate(pool.id, candidate, SourceTag::System, now),
                    PollResult::success(now),
                    None,
                )
            }
            Err(e) => {
                tracing::warn!(
                    pool_id = %pool.id,
                    provider_id = %pool.provider_id,
                    error = %e,
                    "pool poll failed"
                );
                (
                    NewSnapshot::failed(pool.id, &e, now),
                    PollResult::failure(&e, now),
                    Some(e),
                )
            }
        };

        let mut error = provider_error.as_ref().map(ToString::to_string);
        let saved = match self.snapshots.append(snapshot).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::error!(pool_id = %pool.id, error = %e, "snapshot append failed");
                error.get_or_insert_with(|| e.to_string());
                None
            }
        };

        if let Err(e) = self.pools.record_poll_result(pool.id, &poll_result).await {
            tracing::error!(pool_id = %pool.id, error = %e, "poll write-back failed");
        }

        if let Some(saved) = &saved {
            let _ = self.event_bus.publish(MonitorEvent::SnapshotRecorded {
                pool_id: saved.pool_id,
                snapshot_id: saved.id,
                pressure: saved.pressure,
                is_error: saved.is_error(),
                timestamp: Utc::now(),
            });
        }

        UnitOutcome {
            report: UnitReport {
                pool_id: pool.id,
                pool_name: pool.name,
                status: poll_result.status,
                snapshot: saved,
                error,
                elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
            provider_error,
        }
    }

    fn abort_unit(&self, pool: PoolConfig) -> UnitOutcome {
        tracing::error!(pool_id = %pool.id, "worker pool closed, unit skipped");
        UnitOutcome {
            report: UnitReport {
                pool_id: pool.id,
                pool_name: pool.name,
                status: PollStatus::Failed,
                snapshot: None,
                error: Some("worker pool closed".to_string()),
                elapsed_ms: 0,
            },
            provider_error: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Counts, ProviderConfig, SnapshotCandidate, TimeRange};
    use crate::persistence::{InMemoryConfigStore, InMemorySnapshotStore};
    use crate::provider::{ProviderDescriptor, StatusProvider};
    use async_trait::async_trait;

    /// Answers with fixed counts or a fixed error after a delay, tracking
    /// peak concurrency.
    #[derive(Debug)]
    struct Scripted {
        result: Result<Counts, ProviderError>,
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Scripted {
        fn ok(counts: Counts, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(counts),
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        fn err(err: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                result: Err(err),
                delay: Duration::from_millis(10),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StatusProvider for Scripted {
        async fn fetch_status(
            &self,
            _pool_id: PoolId,
            _pool_name: &str,
            _config: &ProviderConfig,
        ) -> Result<SnapshotCandidate, ProviderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.result.clone().map(SnapshotCandidate::new)
        }

        async fn check_connection(&self, _config: &ProviderConfig) -> Result<bool, ProviderError> {
            Ok(true)
        }

        fn describe(&self) -> ProviderDescriptor {
            ProviderDescriptor {
                id: "scripted".to_string(),
                description: "test".to_string(),
            }
        }
    }

    struct Harness {
        orchestrator: PollingOrchestrator,
        providers: Arc<ProviderRegistry>,
        snapshots: Arc<InMemorySnapshotStore>,
        pools: Arc<InMemoryConfigStore>,
        events: broadcast::Receiver<MonitorEvent>,
    }

    fn harness(settings: PollerSettings) -> Harness {
        let providers = Arc::new(ProviderRegistry::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let pools = Arc::new(InMemoryConfigStore::new());
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let orchestrator = PollingOrchestrator::new(
            Arc::clone(&providers),
            Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
            Arc::clone(&pools) as Arc<dyn PoolConfigSource>,
            bus,
            settings,
        );
        Harness {
            orchestrator,
            providers,
            snapshots,
            pools,
            events,
        }
    }

    async fn add_pool(h: &Harness, id: i64, provider_id: &str) {
        h.pools
            .upsert_pool(PoolConfig::new(PoolId::new(id), format!("pool-{id}"), provider_id))
            .await;
    }

    #[tokio::test]
    async fn empty_pool_list_stays_idle() {
        let h = harness(PollerSettings::default());
        let Ok(report) = h.orchestrator.poll_all().await else {
            panic!("poll_all failed");
        };
        assert_eq!(report.outcome, BatchOutcome::Idle);
        assert_eq!(report.total, 0);
        assert_eq!(h.orchestrator.phase(), BatchPhase::Idle);
        assert!(h.snapshots.is_empty().await);
    }

    #[tokio::test]
    async fn one_timeout_in_five_is_partial_failure() {
        let mut h = harness(PollerSettings::default());
        h.providers.register(
            "good",
            Scripted::ok(Counts::new(10, 2, 1, 13), Duration::from_millis(5)),
        );
        h.providers.register(
            "slow",
            Scripted::err(ProviderError::Timeout("no answer".to_string())),
        );
        for id in 1..=4 {
            add_pool(&h, id, "good").await;
        }
        add_pool(&h, 5, "slow").await;

        let Ok(report) = h.orchestrator.poll_all().await else {
            panic!("poll_all failed");
        };
        assert_eq!(report.outcome, BatchOutcome::PartialFailure);
        assert_eq!((report.total, report.succeeded, report.failed), (5, 4, 1));

        for id in 1..=4 {
            let Ok(Some(latest)) = h.snapshots.latest(PoolId::new(id)).await else {
                panic!("pool {id} should have a snapshot");
            };
            assert!(!latest.is_error());
            assert_eq!(latest.pressure.to_string(), "23.08");
        }
        let Ok(Some(failed)) = h.snapshots.latest(PoolId::new(5)).await else {
            panic!("failed pool should have an error snapshot");
        };
        assert!(failed.is_error());
        assert_eq!(failed.counts, Counts::default());

        let Ok(Some(pool)) = h.pools.get_pool(PoolId::new(5)).await else {
            panic!("pool 5 missing");
        };
        assert_eq!(pool.last_poll_status, Some(PollStatus::Timeout));
        assert!(pool.last_poll_error.is_some());

        let mut recorded = 0;
        let mut finished = None;
        while let Ok(event) = h.events.try_recv() {
            match event {
                MonitorEvent::SnapshotRecorded { .. } => recorded += 1,
                MonitorEvent::BatchFinished { outcome, .. } => finished = Some(outcome),
                MonitorEvent::SnapshotsPurged { .. } => {}
            }
        }
        assert_eq!(recorded, 5);
        assert_eq!(finished.as_deref(), Some("partial_failure"));
    }

    #[tokio::test]
    async fn all_success_is_done() {
        let h = harness(PollerSettings::default());
        h.providers.register(
            "good",
            Scripted::ok(Counts::new(1, 0, 0, 1), Duration::from_millis(1)),
        );
        add_pool(&h, 1, "good").await;
        add_pool(&h, 2, "good").await;
        h.pools
            .upsert_pool(PoolConfig::new(PoolId::new(3), "off", "good").with_enabled(false))
            .await;

        let Ok(report) = h.orchestrator.poll_all().await else {
            panic!("poll_all failed");
        };
        assert_eq!(report.outcome, BatchOutcome::Done);
        assert_eq!(report.total, 2);
        let Ok(None) = h.snapshots.latest(PoolId::new(3)).await else {
            panic!("disabled pool must not be polled");
        };
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_without_cancelling() {
        let h = harness(PollerSettings {
            max_concurrent: 10,
            batch_deadline: Duration::from_secs(30),
        });
        h.providers.register(
            "fast",
            Scripted::ok(Counts::new(5, 0, 0, 5), Duration::from_secs(1)),
        );
        h.providers.register(
            "stuck",
            Scripted::ok(Counts::new(7, 0, 0, 7), Duration::from_secs(90)),
        );
        add_pool(&h, 1, "fast").await;
        add_pool(&h, 2, "stuck").await;

        let Ok(report) = h.orchestrator.poll_all().await else {
            panic!("poll_all failed");
        };
        assert_eq!(report.outcome, BatchOutcome::TimedOut);
        assert_eq!((report.succeeded, report.abandoned), (1, 1));
        assert!(h.snapshots.latest(PoolId::new(1)).await.is_ok_and(|s| s.is_some()));
        assert!(h.snapshots.latest(PoolId::new(2)).await.is_ok_and(|s| s.is_none()));

        // the abandoned unit still records once its provider answers
        tokio::time::sleep(Duration::from_secs(120)).await;
        let Ok(Some(late)) = h.snapshots.latest(PoolId::new(2)).await else {
            panic!("abandoned unit should still record");
        };
        assert_eq!(late.counts.valid_count, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_pool_bounds_concurrency() {
        let h = harness(PollerSettings {
            max_concurrent: 3,
            batch_deadline: Duration::from_secs(300),
        });
        let provider = Scripted::ok(Counts::new(1, 0, 0, 1), Duration::from_secs(1));
        h.providers
            .register("p", Arc::clone(&provider) as Arc<dyn StatusProvider>);
        for id in 1..=12 {
            add_pool(&h, id, "p").await;
        }

        let Ok(report) = h.orchestrator.poll_all().await else {
            panic!("poll_all failed");
        };
        assert_eq!(report.outcome, BatchOutcome::Done);
        assert_eq!(provider.peak.load(Ordering::SeqCst), 3);

        let stats = h.orchestrator.task_statistics().await;
        assert_eq!(stats.worker_width, 3);
        assert_eq!(stats.available_workers, 3);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.batches_run, 1);
        assert_eq!(stats.last_batch.map(|b| b.outcome), Some(BatchOutcome::Done));
    }

    #[tokio::test]
    async fn missing_provider_is_recorded_and_reported() {
        let h = harness(PollerSettings::default());
        add_pool(&h, 1, "nowhere").await;

        let result = h.orchestrator.poll_one(PoolId::new(1)).await;
        assert!(matches!(result, Err(MonitorError::ProviderNotFound(ref id)) if id == "nowhere"));

        let Ok(series) = h.snapshots.range(PoolId::new(1), TimeRange::ALL).await else {
            panic!("range failed");
        };
        assert_eq!(series.len(), 1);
        assert!(series.iter().all(StatusSnapshot::is_error));
        let Ok(Some(pool)) = h.pools.get_pool(PoolId::new(1)).await else {
            panic!("pool missing");
        };
        assert_eq!(pool.last_poll_status, Some(PollStatus::Failed));
    }

    #[tokio::test]
    async fn poll_one_rejects_unknown_and_disabled() {
        let h = harness(PollerSettings::default());
        h.pools
            .upsert_pool(PoolConfig::new(PoolId::new(2), "off", "mock").with_enabled(false))
            .await;
        assert!(matches!(
            h.orchestrator.poll_one(PoolId::new(1)).await,
            Err(MonitorError::PoolNotFound(_))
        ));
        assert!(matches!(
            h.orchestrator.poll_one(PoolId::new(2)).await,
            Err(MonitorError::PoolDisabled(_))
        ));
    }

    #[tokio::test]
    async fn poll_one_reports_provider_failure_as_ok() {
        let h = harness(PollerSettings::default());
        h.providers.register(
            "broken",
            Scripted::err(ProviderError::Connection("refused".to_string())),
        );
        add_pool(&h, 1, "broken").await;
        let Ok(report) = h.orchestrator.poll_one(PoolId::new(1)).await else {
            panic!("provider failure should not be an error");
        };
        assert_eq!(report.status, PollStatus::Failed);
        assert!(!report.is_success());
        assert!(report.snapshot.is_some_and(|s| s.is_error()));
    }

    #[tokio::test]
    async fn negative_counts_become_error_snapshot() {
        let h = harness(PollerSettings::default());
        h.providers.register(
            "liar",
            Scripted::ok(Counts::new(-3, 0, 0, 5), Duration::from_millis(1)),
        );
        add_pool(&h, 1, "liar").await;
        let Ok(report) = h.orchestrator.poll_one(PoolId::new(1)).await else {
            panic!("poll failed");
        };
        assert_eq!(report.status, PollStatus::Failed);
        assert!(report.error.is_some_and(|e| e.contains("malformed")));
    }
}
