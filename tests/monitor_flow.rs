//! End-to-end flows through the service facade over in-memory stores.

#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;

use pool_pulse::domain::{
    AggregateStrategy, Counts, EventBus, MonitorEvent, PollStatus, PoolConfig, PoolId,
    ProviderConfig, SnapshotCandidate, TimeRange, VirtualPoolConfig, VirtualPoolDraft,
    VirtualPoolId, now_millis,
};
use pool_pulse::error::MonitorError;
use pool_pulse::persistence::{
    InMemoryConfigStore, InMemorySnapshotStore, PoolConfigSource, SnapshotStore,
};
use pool_pulse::provider::{MockProvider, ProviderRegistry};
use pool_pulse::service::{BatchOutcome, ManualSnapshot, MonitorService, MonitorSettings};

fn mock_config(extra: &[(&str, serde_json::Value)]) -> ProviderConfig {
    let mut config = ProviderConfig::new();
    config.insert("latency_ms".to_string(), serde_json::json!(0));
    for (key, value) in extra {
        config.insert((*key).to_string(), value.clone());
    }
    config
}

struct Fixture {
    service: MonitorService,
    pools: Arc<InMemoryConfigStore>,
    snapshots: Arc<InMemorySnapshotStore>,
}

/// Pools 1 and 2 answer, 3 times out, 4 points at an unregistered
/// provider, 5 is disabled.
async fn fixture() -> Fixture {
    let pools = Arc::new(InMemoryConfigStore::new());
    let timeout = [("fail", serde_json::json!("timeout"))];
    for pool in [
        PoolConfig::new(PoolId::new(1), "alpha", "mock").with_provider_config(mock_config(&[])),
        PoolConfig::new(PoolId::new(2), "beta", "mock").with_provider_config(mock_config(&[])),
        PoolConfig::new(PoolId::new(3), "gamma", "mock").with_provider_config(mock_config(&timeout)),
        PoolConfig::new(PoolId::new(4), "delta", "ldap"),
        PoolConfig::new(PoolId::new(5), "epsilon", "mock").with_enabled(false),
    ] {
        pools.upsert_pool(pool).await;
    }

    let providers = Arc::new(ProviderRegistry::new());
    let _ = providers.register("mock", Arc::new(MockProvider::new()));

    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let service = MonitorService::new(
        providers,
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        Arc::clone(&pools) as Arc<dyn PoolConfigSource>,
        EventBus::new(256),
        MonitorSettings::default(),
    );
    Fixture {
        service,
        pools,
        snapshots,
    }
}

#[tokio::test]
async fn batch_isolates_failures_and_records_every_pool() {
    let fx = fixture().await;
    let mut events = fx.service.event_bus().subscribe();

    let Ok(report) = fx.service.poll_all_now().await else {
        panic!("batch failed to start");
    };
    assert_eq!(report.outcome, BatchOutcome::PartialFailure);
    assert_eq!((report.total, report.succeeded, report.failed), (4, 2, 2));
    assert_eq!(fx.snapshots.len().await, 4);

    let ids: Vec<PoolId> = (1..=5).map(PoolId::new).collect();
    let Ok(latest) = fx.service.latest_statuses(&ids).await else {
        panic!("latest batch failed");
    };
    assert_eq!(latest.len(), 4);
    assert!(!latest.contains_key(&PoolId::new(5)));

    let Some(timed_out) = latest.get(&PoolId::new(3)) else {
        panic!("pool 3 should have an error snapshot");
    };
    assert!(timed_out.is_error());
    assert_eq!(timed_out.counts, Counts::default());

    let Ok(Some(gamma)) = fx.pools.get_pool(PoolId::new(3)).await else {
        panic!("pool 3 should exist");
    };
    assert_eq!(gamma.last_poll_status, Some(PollStatus::Timeout));
    let Ok(Some(delta)) = fx.pools.get_pool(PoolId::new(4)).await else {
        panic!("pool 4 should exist");
    };
    assert_eq!(delta.last_poll_status, Some(PollStatus::Failed));
    assert!(delta.last_poll_error.is_some());

    let mut recorded = 0;
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            MonitorEvent::SnapshotRecorded { .. } => recorded += 1,
            MonitorEvent::BatchFinished { .. } => finished = true,
            MonitorEvent::SnapshotsPurged { .. } => {}
        }
    }
    assert_eq!(recorded, 4);
    assert!(finished);
}

#[tokio::test]
async fn single_poll_errors() {
    let fx = fixture().await;
    assert!(matches!(
        fx.service.poll_one(PoolId::new(99)).await,
        Err(MonitorError::PoolNotFound(_))
    ));
    assert!(matches!(
        fx.service.poll_one(PoolId::new(5)).await,
        Err(MonitorError::PoolDisabled(_))
    ));
    assert!(matches!(
        fx.service.poll_one(PoolId::new(4)).await,
        Err(MonitorError::ProviderNotFound(_))
    ));
    let Ok(report) = fx.service.poll_one(PoolId::new(1)).await else {
        panic!("pool 1 should poll");
    };
    assert!(report.is_success());
}

#[tokio::test]
async fn virtual_pool_sums_latest_member_snapshots() {
    let fx = fixture().await;
    let _ = fx.service.poll_all_now().await;
    fx.pools
        .upsert_virtual_pool(VirtualPoolConfig {
            id: VirtualPoolId::new(1),
            name: "front".to_string(),
            member_pool_ids: vec![PoolId::new(1), PoolId::new(2), PoolId::new(3)],
            strategy: AggregateStrategy::Sum,
            weight_config: BTreeMap::new(),
            enabled: true,
            display_order: 0,
        })
        .await;

    let Ok(latest) = fx
        .service
        .latest_statuses(&[PoolId::new(1), PoolId::new(2)])
        .await
    else {
        panic!("latest failed");
    };
    let expected = latest
        .values()
        .fold(Counts::default(), |acc, s| acc.saturating_add(s.counts));

    let Ok(status) = fx.service.aggregated_status(VirtualPoolId::new(1)).await else {
        panic!("aggregation failed");
    };
    assert_eq!(status.counts, expected);
    assert_eq!(status.reporting_count, 3);

    let Ok(all) = fx.service.all_aggregated_statuses().await else {
        panic!("listing failed");
    };
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn validation_and_preview_never_persist() {
    let fx = fixture().await;
    let draft = VirtualPoolDraft {
        name: "candidate".to_string(),
        member_pool_ids: vec![PoolId::new(1), PoolId::new(5)],
        strategy: Some("average".to_string()),
        weight_config: BTreeMap::new(),
    };
    let Ok(result) = fx.service.validate_virtual_pool(&draft).await else {
        panic!("validation failed");
    };
    assert!(!result.valid);
    assert!(result.message.contains("epsilon"), "{}", result.message);

    let valid = VirtualPoolDraft {
        member_pool_ids: vec![PoolId::new(1), PoolId::new(2)],
        ..draft
    };
    let Ok(preview) = fx.service.preview_virtual_pool(&valid).await else {
        panic!("preview failed");
    };
    assert_eq!(preview.reporting_count, 0);
    assert_eq!(preview.counts, Counts::default());
    assert!(
        fx.service
            .all_aggregated_statuses()
            .await
            .is_ok_and(|v| v.is_empty())
    );
}

#[tokio::test]
async fn retention_removes_only_expired_snapshots() {
    let fx = fixture().await;
    let day = 86_400_000;
    for age_days in [0, 10, 40] {
        let saved = fx
            .service
            .save_manual(ManualSnapshot {
                pool_id: PoolId::new(1),
                candidate: SnapshotCandidate {
                    recorded_at: Some(now_millis() - age_days * day),
                    ..SnapshotCandidate::new(Counts::new(5, 1, 0, 6))
                },
            })
            .await;
        assert!(saved.is_ok());
    }

    let Ok(deleted) = fx.service.purge_expired(30).await else {
        panic!("purge failed");
    };
    assert_eq!(deleted, 1);

    let Ok(stats) = fx
        .service
        .status_statistics(PoolId::new(1), TimeRange::ALL)
        .await
    else {
        panic!("statistics failed");
    };
    assert_eq!(stats.record_count, 2);
    assert_eq!(stats.max_valid_count, Some(5));
}

#[tokio::test]
async fn connection_health_reports_each_enabled_pool() {
    let fx = fixture().await;
    let Ok(report) = fx.service.connection_health().await else {
        panic!("health check failed");
    };
    assert_eq!(report.total, 4);
    assert_eq!(report.pools.len(), 4);
    assert!(report.unhealthy >= 1, "pool 4 has no provider");
}
