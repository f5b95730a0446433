//! Connection health checker.
//!
//! Periodically probes `check_connection` on the provider of every enabled
//! pool and keeps the most recent [`ConnectionHealthReport`]. Probing has
//! no persistence side effects. Per-pool failures are reported in the
//! result, never raised.
//!
//! # Overall status
//!
//! - no unhealthy pool: `up`
//! - some unhealthy, some healthy: `warning`
//! - no healthy pool: `down`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::domain::PoolId;
use crate::error::{MonitorError, ProviderError};
use crate::persistence::PoolConfigSource;
use crate::provider::ProviderRegistry;

/// Connectivity of one pool's backing system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// The provider reported the system reachable.
    Healthy,
    /// The provider reached the system but it reported itself unhealthy.
    Unhealthy,
    /// No provider is registered under the pool's provider id.
    NoProvider,
    /// The probe failed.
    Error {
        /// Failure reason.
        message: String,
    },
    /// The probe did not finish before the deadline.
    Timeout,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Healthy`].
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Aggregate connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    /// No pool is unhealthy.
    Up,
    /// Some pools are unhealthy, some healthy.
    Warning,
    /// No pool is healthy.
    Down,
}

/// Connectivity of a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PoolConnectivity {
    /// Probed pool.
    pub pool_id: PoolId,
    /// Pool display name.
    pub name: String,
    /// Provider the pool is bound to.
    pub provider_id: String,
    /// Probe result.
    #[serde(flatten)]
    pub state: ConnectionState,
}

/// Result of one health check round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConnectionHealthReport {
    /// Aggregate status.
    pub status: OverallHealth,
    /// Pools probed.
    pub total: usize,
    /// Pools reported healthy.
    pub healthy: usize,
    /// Pools not reported healthy.
    pub unhealthy: usize,
    /// Per-pool results, ascending by pool id.
    pub pools: Vec<PoolConnectivity>,
    /// Round start time.
    pub checked_at: DateTime<Utc>,
}

impl ConnectionHealthReport {
    fn from_pools(pools: Vec<PoolConnectivity>, checked_at: DateTime<Utc>) -> Self {
        let total = pools.len();
        let healthy = pools.iter().filter(|p| p.state.is_healthy()).count();
        let unhealthy = total - healthy;
        let status = if unhealthy == 0 {
            OverallHealth::Up
        } else if healthy > 0 {
            OverallHealth::Warning
        } else {
            OverallHealth::Down
        };
        Self {
            status,
            total,
            healthy,
            unhealthy,
            pools,
            checked_at,
        }
    }
}

/// Probes provider connectivity for all enabled pools.
#[derive(Debug, Clone)]
pub struct ConnectionHealthChecker {
    providers: Arc<ProviderRegistry>,
    pools: Arc<dyn PoolConfigSource>,
    probes: Arc<Semaphore>,
    deadline: Duration,
    last: Arc<RwLock<Option<ConnectionHealthReport>>>,
}

impl ConnectionHealthChecker {
    /// Creates a checker running at most `max_concurrent` probes at once,
    /// each round bounded by `deadline`.
    #[must_use]
    pub fn new(
        providers: Arc<ProviderRegistry>,
        pools: Arc<dyn PoolConfigSource>,
        max_concurrent: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            providers,
            pools,
            probes: Arc::new(Semaphore::new(max_concurrent.max(1))),
            deadline,
            last: Arc::new(RwLock::new(None)),
        }
    }

    /// Probes every enabled pool and caches the report.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the pool list cannot be read.
    pub async fn check_all(&self) -> Result<ConnectionHealthReport, MonitorError> {
        let checked_at = Utc::now();
        let pools = self.pools.list_enabled_pools().await?;
        let deadline = Instant::now() + self.deadline;

        // every pool starts as timed out and is overwritten when its probe ends
        let mut results: BTreeMap<PoolId, PoolConnectivity> = BTreeMap::new();
        let mut probes = JoinSet::new();
        for pool in pools {
            results.insert(
                pool.id,
                PoolConnectivity {
                    pool_id: pool.id,
                    name: pool.name.clone(),
                    provider_id: pool.provider_id.clone(),
                    state: ConnectionState::Timeout,
                },
            );
            let provider = match self.providers.get(&pool.provider_id) {
                Ok(provider) => provider,
                Err(_) => {
                    if let Some(entry) = results.get_mut(&pool.id) {
                        entry.state = ConnectionState::NoProvider;
                    }
                    continue;
                }
            };
            let permits = Arc::clone(&self.probes);
            probes.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (pool.id, Err(ProviderError::Connection("probe pool closed".to_string())));
                };
                (pool.id, provider.check_connection(&pool.provider_config).await)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, probes.join_next()).await {
                Ok(Some(Ok((pool_id, outcome)))) => {
                    let state = match outcome {
                        Ok(true) => ConnectionState::Healthy,
                        Ok(false) => ConnectionState::Unhealthy,
                        Err(e) => ConnectionState::Error {
                            message: e.to_string(),
                        },
                    };
                    if let Some(entry) = results.get_mut(&pool_id) {
                        entry.state = state;
                    }
                }
                Ok(Some(Err(join_err))) => {
                    tracing::error!(error = %join_err, "connection probe panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(unfinished = probes.len(), "connection probes timed out");
                    probes.abort_all();
                    break;
                }
            }
        }

        let report = ConnectionHealthReport::from_pools(results.into_values().collect(), checked_at);
        for pool in report.pools.iter().filter(|p| !p.state.is_healthy()) {
            tracing::warn!(
                pool_id = %pool.pool_id,
                provider_id = %pool.provider_id,
                state = ?pool.state,
                "pool connection unhealthy"
            );
        }
        tracing::info!(
            status = ?report.status,
            total = report.total,
            healthy = report.healthy,
            "connection health checked"
        );
        *self.last.write().await = Some(report.clone());
        Ok(report)
    }

    /// Most recent report, running a check first if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if a fresh check is needed and
    /// the pool list cannot be read.
    pub async fn connection_health(&self) -> Result<ConnectionHealthReport, MonitorError> {
        if let Some(report) = self.last.read().await.clone() {
            return Ok(report);
        }
        self.check_all().await
    }

    /// Most recent report without triggering a check.
    pub async fn last_report(&self) -> Option<ConnectionHealthReport> {
        self.last.read().await.clone()
    }

    /// Runs a check every `period` until shutdown.
    pub async fn run(self, period: Duration, shutdown: broadcast::Receiver<()>) {
        super::shutdown::every("connection-health", period, shutdown, || {
            let checker = self.clone();
            async move {
                if let Err(e) = checker.check_all().await {
                    tracing::error!(error = %e, "connection health check failed");
                }
            }
        })
        .await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PoolConfig, ProviderConfig, SnapshotCandidate};
    use crate::persistence::InMemoryConfigStore;
    use crate::provider::{ProviderDescriptor, StatusProvider};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Probe {
        answer: Result<bool, ProviderError>,
        delay: Duration,
    }

    #[async_trait]
    impl StatusProvider for Probe {
        async fn fetch_status(
            &self,
            _pool_id: PoolId,
            _pool_name: &str,
            _config: &ProviderConfig,
        ) -> Result<SnapshotCandidate, ProviderError> {
            Err(ProviderError::Connection("not used".to_string()))
        }

        async fn check_connection(&self, _config: &ProviderConfig) -> Result<bool, ProviderError> {
            tokio::time::sleep(self.delay).await;
            self.answer.clone()
        }

        fn describe(&self) -> ProviderDescriptor {
            ProviderDescriptor {
                id: "probe".to_string(),
                description: "test".to_string(),
            }
        }
    }

    fn probe(answer: Result<bool, ProviderError>, delay_secs: u64) -> Arc<Probe> {
        Arc::new(Probe {
            answer,
            delay: Duration::from_secs(delay_secs),
        })
    }

    async fn checker_with(pools: &[(i64, &str)]) -> (ConnectionHealthChecker, Arc<ProviderRegistry>) {
        let registry = Arc::new(ProviderRegistry::new());
        let store = Arc::new(InMemoryConfigStore::new());
        for (id, provider) in pools {
            store
                .upsert_pool(PoolConfig::new(PoolId::new(*id), format!("p{id}"), *provider))
                .await;
        }
        let checker = ConnectionHealthChecker::new(
            Arc::clone(&registry),
            store as Arc<dyn PoolConfigSource>,
            4,
            Duration::from_secs(10),
        );
        (checker, registry)
    }

    fn state_of(report: &ConnectionHealthReport, id: i64) -> Option<ConnectionState> {
        report
            .pools
            .iter()
            .find(|p| p.pool_id == PoolId::new(id))
            .map(|p| p.state.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn classifies_every_pool() {
        let (checker, registry) = checker_with(&[
            (1, "up"),
            (2, "down"),
            (3, "broken"),
            (4, "missing"),
            (5, "slow"),
        ])
        .await;
        registry.register("up", probe(Ok(true), 1));
        registry.register("down", probe(Ok(false), 1));
        registry.register(
            "broken",
            probe(Err(ProviderError::Connection("refused".to_string())), 1),
        );
        registry.register("slow", probe(Ok(true), 60));

        let Ok(report) = checker.check_all().await else {
            panic!("check failed");
        };
        assert_eq!(report.total, 5);
        assert_eq!(report.healthy, 1);
        assert_eq!(report.status, OverallHealth::Warning);
        assert_eq!(state_of(&report, 1), Some(ConnectionState::Healthy));
        assert_eq!(state_of(&report, 2), Some(ConnectionState::Unhealthy));
        assert!(matches!(state_of(&report, 3), Some(ConnectionState::Error { .. })));
        assert_eq!(state_of(&report, 4), Some(ConnectionState::NoProvider));
        assert_eq!(state_of(&report, 5), Some(ConnectionState::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn overall_status_rules() {
        let (checker, registry) = checker_with(&[(1, "up"), (2, "up")]).await;
        registry.register("up", probe(Ok(true), 0));
        let Ok(report) = checker.check_all().await else {
            panic!("check failed");
        };
        assert_eq!(report.status, OverallHealth::Up);

        registry.register("up", probe(Ok(false), 0));
        let Ok(report) = checker.check_all().await else {
            panic!("check failed");
        };
        assert_eq!(report.status, OverallHealth::Down);
    }

    #[tokio::test]
    async fn no_pools_is_up() {
        let (checker, _registry) = checker_with(&[]).await;
        let Ok(report) = checker.check_all().await else {
            panic!("check failed");
        };
        assert_eq!(report.status, OverallHealth::Up);
        assert_eq!(report.total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn report_is_cached() {
        let (checker, registry) = checker_with(&[(1, "up")]).await;
        registry.register("up", probe(Ok(true), 0));
        assert!(checker.last_report().await.is_none());
        let Ok(first) = checker.connection_health().await else {
            panic!("check failed");
        };
        registry.unregister("up");
        let Ok(cached) = checker.connection_health().await else {
            panic!("cached read failed");
        };
        assert_eq!(first, cached);
    }
}
