//! Random-data provider for demos and tests.
//!
//! Recognised configuration keys:
//!
//! | Key          | Type   | Effect                                                   |
//! |--------------|--------|----------------------------------------------------------|
//! | `fail`       | string | `"timeout"`, `"connection"` or `"malformed"` forces that failure |
//! | `latency_ms` | number | fixed latency instead of the random 50–150 ms            |

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{ProviderDescriptor, StatusProvider};
use crate::domain::{Counts, PoolId, ProviderConfig, SnapshotCandidate};
use crate::error::ProviderError;

/// Registration identifier of the mock provider.
pub const ID: &str = "mock";

/// Generates plausible random counts after a short simulated latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Random counts: total in `[1000, 5000)`, invalid below `total - 50`,
/// cooling below `total / 20`, valid takes the remainder.
fn random_counts<R: Rng>(rng: &mut R) -> Counts {
    let total: i64 = rng.gen_range(1_000..5_000);
    let invalid = rng.gen_range(0..total - 50);
    let cooling = rng.gen_range(0..total / 20);
    let valid = total - invalid - cooling;
    if valid < 0 {
        Counts::new(0, total - cooling, cooling, total)
    } else {
        Counts::new(valid, invalid, cooling, total)
    }
}

fn latency(config: &ProviderConfig, low_ms: u64, high_ms: u64) -> Duration {
    let ms = config
        .get("latency_ms")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or_else(|| rand::thread_rng().gen_range(low_ms..high_ms));
    Duration::from_millis(ms)
}

fn forced_failure(config: &ProviderConfig, pool_name: &str) -> Option<ProviderError> {
    match config.get("fail").and_then(serde_json::Value::as_str)? {
        "timeout" => Some(ProviderError::Timeout(format!(
            "simulated timeout for {pool_name}"
        ))),
        "connection" => Some(ProviderError::Connection(format!(
            "simulated connection failure for {pool_name}"
        ))),
        "malformed" => Some(ProviderError::MalformedResult(format!(
            "simulated malformed payload for {pool_name}"
        ))),
        _ => None,
    }
}

#[async_trait]
impl StatusProvider for MockProvider {
    async fn fetch_status(
        &self,
        pool_id: PoolId,
        pool_name: &str,
        config: &ProviderConfig,
    ) -> Result<SnapshotCandidate, ProviderError> {
        tokio::time::sleep(latency(config, 50, 150)).await;
        if let Some(err) = forced_failure(config, pool_name) {
            return Err(err);
        }
        let counts = random_counts(&mut rand::thread_rng());
        tracing::debug!(%pool_id, pool_name, ?counts, "mock counts generated");
        Ok(SnapshotCandidate::new(counts))
    }

    async fn check_connection(&self, config: &ProviderConfig) -> Result<bool, ProviderError> {
        tokio::time::sleep(latency(config, 10, 60)).await;
        if let Some(err) = forced_failure(config, "connection check") {
            return Err(err);
        }
        Ok(rand::thread_rng().gen_bool(0.9))
    }

    fn describe(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: ID.to_string(),
            description: "Simulated data source producing random pool counts for demos and tests"
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ProviderConfig {
        let serde_json::Value::Object(map) = value else {
            panic!("config must be an object");
        };
        map
    }

    #[test]
    fn random_counts_are_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let counts = random_counts(&mut rng);
            assert!(!counts.has_negative());
            assert!(counts.is_consistent());
            assert!((1_000..5_000).contains(&counts.total_count));
            assert!(counts.cooling_count < counts.total_count / 20);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_returns_counts() {
        let provider = MockProvider::new();
        let Ok(candidate) = provider
            .fetch_status(PoolId::new(1), "p1", &ProviderConfig::new())
            .await
        else {
            panic!("mock fetch should succeed");
        };
        assert!(candidate.counts.total_count >= 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_failures_are_reported() {
        let provider = MockProvider::new();
        let cfg = config(json!({"fail": "timeout", "latency_ms": 0}));
        let result = provider.fetch_status(PoolId::new(1), "p1", &cfg).await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));

        let cfg = config(json!({"fail": "malformed"}));
        let result = provider.fetch_status(PoolId::new(1), "p1", &cfg).await;
        assert!(matches!(result, Err(ProviderError::MalformedResult(_))));

        let cfg = config(json!({"fail": "connection"}));
        let result = provider.check_connection(&cfg).await;
        assert!(matches!(result, Err(ProviderError::Connection(_))));
    }

    #[test]
    fn describes_itself_as_mock() {
        assert_eq!(MockProvider::new().describe().id, ID);
    }
}
