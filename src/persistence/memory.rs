//! In-memory stores.
//!
//! Used by tests and when persistence is disabled. Both stores are plain
//! maps behind a [`tokio::sync::RwLock`]; reads run concurrently and each
//! write holds the lock only for the map update.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PoolConfigSource, SnapshotStore, clamp_page_size};
use crate::domain::{
    AggregateStrategy, NewSnapshot, Page, PollResult, PoolConfig, PoolId, StatusSnapshot,
    TimeRange, VirtualPoolConfig, VirtualPoolId, now_millis,
};
use crate::error::MonitorError;
use crate::provider::mock;

/// Snapshot series held in memory, one ascending vector per pool.
#[derive(Debug)]
pub struct InMemorySnapshotStore {
    series: RwLock<HashMap<PoolId, Vec<StatusSnapshot>>>,
    next_id: AtomicI64,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Total number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.series.read().await.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

fn order_key(s: &StatusSnapshot) -> (i64, i64) {
    (s.recorded_at, s.id)
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn append(&self, snapshot: NewSnapshot) -> Result<StatusSnapshot, MonitorError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let saved = snapshot.into_snapshot(id, now_millis());
        let mut map = self.series.write().await;
        let series = map.entry(saved.pool_id).or_default();
        let key = order_key(&saved);
        let at = series.partition_point(|s| order_key(s) <= key);
        series.insert(at, saved.clone());
        Ok(saved)
    }

    async fn latest(&self, pool_id: PoolId) -> Result<Option<StatusSnapshot>, MonitorError> {
        let map = self.series.read().await;
        Ok(map.get(&pool_id).and_then(|s| s.last()).cloned())
    }

    async fn latest_batch(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<HashMap<PoolId, StatusSnapshot>, MonitorError> {
        let map = self.series.read().await;
        Ok(pool_ids
            .iter()
            .filter_map(|id| {
                map.get(id)
                    .and_then(|s| s.last())
                    .map(|snapshot| (*id, snapshot.clone()))
            })
            .collect())
    }

    async fn range(
        &self,
        pool_id: PoolId,
        range: TimeRange,
    ) -> Result<Vec<StatusSnapshot>, MonitorError> {
        let map = self.series.read().await;
        Ok(map
            .get(&pool_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| range.contains(s.recorded_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn page(
        &self,
        pool_id: Option<PoolId>,
        range: TimeRange,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StatusSnapshot>, MonitorError> {
        let page_size = clamp_page_size(page_size);
        let map = self.series.read().await;
        let mut matching: Vec<&StatusSnapshot> = map
            .iter()
            .filter(|(id, _)| pool_id.is_none_or(|wanted| **id == wanted))
            .flat_map(|(_, series)| series.iter())
            .filter(|s| range.contains(s.recorded_at))
            .collect();
        matching.sort_by_key(|s| std::cmp::Reverse(order_key(s)));

        let skip = usize::try_from(u64::from(page) * u64::from(page_size)).unwrap_or(usize::MAX);
        let items = matching
            .iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|s| (*s).clone())
            .collect();
        Ok(Page {
            items,
            total: matching.len() as u64,
            page,
            page_size,
        })
    }

    async fn purge_older_than(&self, cutoff: i64) -> Result<u64, MonitorError> {
        let mut map = self.series.write().await;
        let mut removed = 0_u64;
        for series in map.values_mut() {
            let before = series.len();
            series.retain(|s| s.recorded_at >= cutoff);
            removed += (before - series.len()) as u64;
        }
        map.retain(|_, series| !series.is_empty());
        Ok(removed)
    }
}

/// Pool and virtual-pool configuration held in memory.
///
/// Besides the [`PoolConfigSource`] contract it exposes upsert and remove
/// helpers so tests and demo setups can seed it.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    pools: RwLock<BTreeMap<PoolId, PoolConfig>>,
    virtual_pools: RwLock<BTreeMap<VirtualPoolId, VirtualPoolConfig>>,
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a pool.
    pub async fn upsert_pool(&self, pool: PoolConfig) {
        self.pools.write().await.insert(pool.id, pool);
    }

    /// Removes a pool.
    pub async fn remove_pool(&self, id: PoolId) -> Option<PoolConfig> {
        self.pools.write().await.remove(&id)
    }

    /// Inserts or replaces a virtual pool.
    pub async fn upsert_virtual_pool(&self, virtual_pool: VirtualPoolConfig) {
        self.virtual_pools
            .write()
            .await
            .insert(virtual_pool.id, virtual_pool);
    }

    /// Seeds `count` enabled pools on the mock provider, ids `1..=count`,
    /// plus one virtual pool summing them all. Zero seeds nothing.
    pub async fn seed_demo(&self, count: u32) {
        if count == 0 {
            return;
        }
        let ids: Vec<PoolId> = (1..=i64::from(count)).map(PoolId::new).collect();
        for id in &ids {
            self.upsert_pool(PoolConfig::new(*id, format!("demo-pool-{id}"), mock::ID))
                .await;
        }
        self.upsert_virtual_pool(VirtualPoolConfig {
            id: VirtualPoolId::new(1),
            name: "all-demo-pools".to_string(),
            member_pool_ids: ids,
            strategy: AggregateStrategy::Sum,
            weight_config: BTreeMap::new(),
            enabled: true,
            display_order: 0,
        })
        .await;
        tracing::info!(count, "demo pools seeded");
    }
}

#[async_trait]
impl PoolConfigSource for InMemoryConfigStore {
    async fn list_enabled_pools(&self) -> Result<Vec<PoolConfig>, MonitorError> {
        let pools = self.pools.read().await;
        Ok(pools.values().filter(|p| p.enabled).cloned().collect())
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<PoolConfig>, MonitorError> {
        Ok(self.pools.read().await.get(&id).cloned())
    }

    async fn list_enabled_virtual_pools(&self) -> Result<Vec<VirtualPoolConfig>, MonitorError> {
        let map = self.virtual_pools.read().await;
        let mut enabled: Vec<VirtualPoolConfig> = map.values().filter(|v| v.enabled).cloned().collect();
        enabled.sort_by_key(|v| (v.display_order, v.id));
        Ok(enabled)
    }

    async fn get_virtual_pool(
        &self,
        id: VirtualPoolId,
    ) -> Result<Option<VirtualPoolConfig>, MonitorError> {
        Ok(self.virtual_pools.read().await.get(&id).cloned())
    }

    async fn record_poll_result(
        &self,
        id: PoolId,
        result: &PollResult,
    ) -> Result<(), MonitorError> {
        let mut pools = self.pools.write().await;
        let pool = pools.get_mut(&id).ok_or(MonitorError::PoolNotFound(id))?;
        pool.apply_poll_result(result);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Counts, PollStatus, SnapshotCandidate, SourceTag};

    fn at(pool: i64, recorded_at: i64, valid: i64) -> NewSnapshot {
        let candidate = SnapshotCandidate {
            recorded_at: Some(recorded_at),
            ..SnapshotCandidate::new(Counts::new(valid, 1, 0, valid + 1))
        };
        NewSnapshot::from_candidate(PoolId::new(pool), candidate, SourceTag::System, 0)
    }

    #[tokio::test]
    async fn latest_follows_recorded_at_not_insertion_order() {
        let store = InMemorySnapshotStore::new();
        let _ = store.append(at(1, 200, 5)).await;
        let _ = store.append(at(1, 100, 9)).await;
        let Ok(Some(latest)) = store.latest(PoolId::new(1)).await else {
            panic!("latest should exist");
        };
        assert_eq!(latest.recorded_at, 200);
        assert_eq!(latest.counts.valid_count, 5);
    }

    #[tokio::test]
    async fn latest_batch_omits_pools_without_data() {
        let store = InMemorySnapshotStore::new();
        let _ = store.append(at(1, 10, 1)).await;
        let Ok(map) = store
            .latest_batch(&[PoolId::new(1), PoolId::new(2), PoolId::new(3)])
            .await
        else {
            panic!("latest_batch must not fail on missing pools");
        };
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&PoolId::new(1)));
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ascending() {
        let store = InMemorySnapshotStore::new();
        for t in [30, 10, 20, 40] {
            let _ = store.append(at(1, t, 1)).await;
        }
        let Ok(series) = store
            .range(PoolId::new(1), TimeRange::new(Some(20), Some(40)))
            .await
        else {
            panic!("range failed");
        };
        let times: Vec<i64> = series.iter().map(|s| s.recorded_at).collect();
        assert_eq!(times, vec![20, 30, 40]);
    }

    #[tokio::test]
    async fn purge_keeps_snapshots_at_cutoff() {
        let store = InMemorySnapshotStore::new();
        for t in [99, 100, 101] {
            let _ = store.append(at(1, t, 1)).await;
        }
        let _ = store.append(at(2, 50, 1)).await;

        let Ok(removed) = store.purge_older_than(100).await else {
            panic!("purge failed");
        };
        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 2);
        let Ok(remaining) = store.range(PoolId::new(1), TimeRange::ALL).await else {
            panic!("range failed");
        };
        assert_eq!(remaining.first().map(|s| s.recorded_at), Some(100));
    }

    #[tokio::test]
    async fn page_is_newest_first() {
        let store = InMemorySnapshotStore::new();
        for t in 1..=5 {
            let _ = store.append(at(1, t, 1)).await;
        }
        let _ = store.append(at(2, 3, 1)).await;

        let Ok(page) = store.page(Some(PoolId::new(1)), TimeRange::ALL, 1, 2).await else {
            panic!("page failed");
        };
        assert_eq!(page.total, 5);
        let times: Vec<i64> = page.items.iter().map(|s| s.recorded_at).collect();
        assert_eq!(times, vec![3, 2]);

        let Ok(all) = store.page(None, TimeRange::ALL, 0, 100).await else {
            panic!("page failed");
        };
        assert_eq!(all.total, 6);
    }

    #[tokio::test]
    async fn write_back_updates_pool() {
        let store = InMemoryConfigStore::new();
        store.upsert_pool(PoolConfig::new(PoolId::new(1), "a", "mock")).await;
        let result = store
            .record_poll_result(PoolId::new(1), &PollResult::success(77))
            .await;
        assert!(result.is_ok());
        let Ok(Some(pool)) = store.get_pool(PoolId::new(1)).await else {
            panic!("pool should exist");
        };
        assert_eq!(pool.last_poll_status, Some(PollStatus::Success));
        assert_eq!(pool.last_poll_at, Some(77));

        let missing = store
            .record_poll_result(PoolId::new(9), &PollResult::success(1))
            .await;
        assert!(matches!(missing, Err(MonitorError::PoolNotFound(_))));
    }

    #[tokio::test]
    async fn virtual_pools_listed_by_display_order() {
        let store = InMemoryConfigStore::new();
        for (id, order, enabled) in [(1, 5, true), (2, 1, true), (3, 0, false), (4, 1, true)] {
            store
                .upsert_virtual_pool(VirtualPoolConfig {
                    id: VirtualPoolId::new(id),
                    name: format!("v{id}"),
                    member_pool_ids: vec![PoolId::new(1)],
                    strategy: AggregateStrategy::Sum,
                    weight_config: BTreeMap::new(),
                    enabled,
                    display_order: order,
                })
                .await;
        }
        let Ok(listed) = store.list_enabled_virtual_pools().await else {
            panic!("list failed");
        };
        let ids: Vec<i64> = listed.iter().map(|v| v.id.get()).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[tokio::test]
    async fn demo_seed_creates_pools_and_summing_virtual_pool() {
        let store = InMemoryConfigStore::new();
        store.seed_demo(3).await;
        let Ok(pools) = store.list_enabled_pools().await else {
            panic!("list failed");
        };
        assert_eq!(pools.len(), 3);
        assert!(pools.iter().all(|p| p.provider_id == mock::ID));
        let Ok(Some(virtual_pool)) = store.get_virtual_pool(VirtualPoolId::new(1)).await else {
            panic!("virtual pool should exist");
        };
        assert_eq!(virtual_pool.member_pool_ids.len(), 3);

        let empty = InMemoryConfigStore::new();
        empty.seed_demo(0).await;
        assert!(empty.list_enabled_pools().await.is_ok_and(|p| p.is_empty()));
    }
}
