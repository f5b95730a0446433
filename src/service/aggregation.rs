//! Virtual pool aggregation.
//!
//! Aggregated status is never stored. Every request reads the latest
//! snapshot of each member pool and recombines them under the virtual
//! pool's strategy. Members without any snapshot are skipped; error
//! snapshots take part with their zero counts.
//!
//! The aggregated pressure is the *health* ratio `valid / total`, the
//! opposite sense of the stress pressure stored on snapshots.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    AggregateStrategy, Counts, PoolId, Pressure, StatusSnapshot, VirtualPoolConfig,
    VirtualPoolDraft, VirtualPoolId,
};
use crate::error::MonitorError;
use crate::persistence::{PoolConfigSource, SnapshotStore};

/// Composite status of a virtual pool, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AggregatedStatus {
    /// Virtual pool, absent for previews of unsaved configurations.
    pub virtual_pool_id: Option<VirtualPoolId>,
    /// Virtual pool name.
    pub name: String,
    /// Strategy used.
    pub strategy: AggregateStrategy,
    /// Combined counts.
    #[serde(flatten)]
    pub counts: Counts,
    /// Health pressure, `valid / total`.
    pub pressure: Pressure,
    /// Distinct member pools configured.
    pub member_count: usize,
    /// Members that had a snapshot and took part.
    pub reporting_count: usize,
}

/// Outcome of validating a virtual pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationResult {
    /// `true` if the configuration is acceptable.
    pub valid: bool,
    /// Rejection reason, or a confirmation.
    pub message: String,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            message: "configuration is valid".to_string(),
        }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Catalog entry describing a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StrategyInfo {
    /// Wire value.
    pub value: AggregateStrategy,
    /// Human-readable name.
    pub label: String,
    /// Explanation.
    pub description: String,
}

/// Combines the latest snapshots of `members` under `strategy`.
///
/// Duplicate member ids count once. Members missing from `latest` are
/// skipped. Returns the counts and the number of members that took part.
#[must_use]
pub fn combine(
    strategy: AggregateStrategy,
    members: &[PoolId],
    latest: &HashMap<PoolId, StatusSnapshot>,
    weights: &BTreeMap<PoolId, f64>,
) -> (Counts, usize) {
    let mut seen = HashSet::new();
    let present: Vec<(PoolId, Counts)> = members
        .iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| latest.get(id).map(|s| (*id, s.counts)))
        .collect();
    let reporting = present.len();
    if present.is_empty() {
        return (Counts::default(), 0);
    }

    let counts = match strategy {
        AggregateStrategy::Sum => present
            .iter()
            .fold(Counts::default(), |acc, (_, c)| acc.saturating_add(*c)),
        AggregateStrategy::Average => {
            let sum = present
                .iter()
                .fold(Counts::default(), |acc, (_, c)| acc.saturating_add(*c));
            let n = i64::try_from(present.len()).unwrap_or(i64::MAX);
            Counts::new(
                sum.valid_count / n,
                sum.invalid_count / n,
                sum.cooling_count / n,
                sum.total_count / n,
            )
        }
        AggregateStrategy::Weighted => weighted_mean(&present, weights),
    };
    (counts, reporting)
}

/// `Σ(wᵢ·vᵢ) / Σwᵢ` per field, truncated. Weight defaults to 1; a zero
/// weight sum yields zero counts.
fn weighted_mean(present: &[(PoolId, Counts)], weights: &BTreeMap<PoolId, f64>) -> Counts {
    let weight_of = |id: &PoolId| {
        weights
            .get(id)
            .copied()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .unwrap_or(1.0)
    };
    let total_weight: f64 = present.iter().map(|(id, _)| weight_of(id)).sum();
    if total_weight <= 0.0 {
        return Counts::default();
    }
    let field = |pick: fn(&Counts) -> i64| -> i64 {
        #[allow(clippy::cast_precision_loss)]
        let weighted: f64 = present
            .iter()
            .map(|(id, c)| weight_of(id) * pick(c) as f64)
            .sum();
        let mean = weighted / total_weight;
        let nearest = mean.round();
        // an integral mean may land a few ulps below the integer
        let tolerance = weighted.abs().max(1.0) * 4.0 * f64::EPSILON;
        let exact = (nearest * total_weight - weighted).abs() <= tolerance;
        #[allow(clippy::cast_possible_truncation)]
        let value = (if exact { nearest } else { mean.trunc() }) as i64;
        value
    };
    Counts::new(
        field(|c| c.valid_count),
        field(|c| c.invalid_count),
        field(|c| c.cooling_count),
        field(|c| c.total_count),
    )
}

fn distinct_count(members: &[PoolId]) -> usize {
    members.iter().collect::<HashSet<_>>().len()
}

/// Computes, validates and previews virtual pool status.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    snapshots: Arc<dyn SnapshotStore>,
    pools: Arc<dyn PoolConfigSource>,
}

impl AggregationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(snapshots: Arc<dyn SnapshotStore>, pools: Arc<dyn PoolConfigSource>) -> Self {
        Self { snapshots, pools }
    }

    async fn combine_latest(
        &self,
        strategy: AggregateStrategy,
        members: &[PoolId],
        weights: &BTreeMap<PoolId, f64>,
    ) -> Result<(Counts, usize), MonitorError> {
        let latest = self.snapshots.latest_batch(members).await?;
        Ok(combine(strategy, members, &latest, weights))
    }

    /// Aggregated status of a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn compute(&self, config: &VirtualPoolConfig) -> Result<AggregatedStatus, MonitorError> {
        let (counts, reporting_count) = self
            .combine_latest(config.strategy, &config.member_pool_ids, &config.weight_config)
            .await?;
        Ok(AggregatedStatus {
            virtual_pool_id: Some(config.id),
            name: config.name.clone(),
            strategy: config.strategy,
            pressure: Pressure::health(&counts),
            counts,
            member_count: distinct_count(&config.member_pool_ids),
            reporting_count,
        })
    }

    /// Aggregated status of one virtual pool.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::VirtualPoolNotFound`] if it does not exist,
    /// or [`MonitorError::Persistence`] on storage failure.
    pub async fn aggregated_status(
        &self,
        id: VirtualPoolId,
    ) -> Result<AggregatedStatus, MonitorError> {
        let config = self
            .pools
            .get_virtual_pool(id)
            .await?
            .ok_or(MonitorError::VirtualPoolNotFound(id))?;
        self.compute(&config).await
    }

    /// Aggregated status of every enabled virtual pool, by display order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn all_aggregated_statuses(&self) -> Result<Vec<AggregatedStatus>, MonitorError> {
        let configs = self.pools.list_enabled_virtual_pools().await?;
        let mut statuses = Vec::with_capacity(configs.len());
        for config in &configs {
            statuses.push(self.compute(config).await?);
        }
        Ok(statuses)
    }

    /// Checks a candidate configuration against the current pools.
    ///
    /// Rejects a blank name, an empty member list, members that are
    /// missing or disabled, an unknown strategy, and negative or
    /// non-finite weights. Snapshots are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure; rejection
    /// is reported in the [`ValidationResult`].
    pub async fn validate(&self, draft: &VirtualPoolDraft) -> Result<ValidationResult, MonitorError> {
        if draft.name.trim().is_empty() {
            return Ok(ValidationResult::reject("virtual pool name must not be blank"));
        }
        if draft.member_pool_ids.is_empty() {
            return Ok(ValidationResult::reject(
                "at least one member pool is required",
            ));
        }
        for id in &draft.member_pool_ids {
            match self.pools.get_pool(*id).await? {
                None => return Ok(ValidationResult::reject(format!("pool {id} does not exist"))),
                Some(pool) if !pool.enabled => {
                    return Ok(ValidationResult::reject(format!(
                        "pool {id} ({}) is disabled",
                        pool.name
                    )));
                }
                Some(_) => {}
            }
        }
        if let Err(message) = draft.parsed_strategy() {
            return Ok(ValidationResult::reject(message));
        }
        if let Some((id, weight)) = draft
            .weight_config
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Ok(ValidationResult::reject(format!(
                "weight {weight} for pool {id} must be a finite non-negative number"
            )));
        }
        Ok(ValidationResult::ok())
    }

    /// Validates a candidate configuration and computes the status it
    /// would have now. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ConfigValidation`] with the rejection
    /// message if the configuration is invalid, or
    /// [`MonitorError::Persistence`] on storage failure.
    pub async fn preview(&self, draft: &VirtualPoolDraft) -> Result<AggregatedStatus, MonitorError> {
        let validation = self.validate(draft).await?;
        if !validation.valid {
            return Err(MonitorError::ConfigValidation(validation.message));
        }
        let strategy = draft
            .parsed_strategy()
            .map_err(MonitorError::ConfigValidation)?;
        let (counts, reporting_count) = self
            .combine_latest(strategy, &draft.member_pool_ids, &draft.weight_config)
            .await?;
        Ok(AggregatedStatus {
            virtual_pool_id: None,
            name: draft.name.trim().to_string(),
            strategy,
            pressure: Pressure::health(&counts),
            counts,
            member_count: distinct_count(&draft.member_pool_ids),
            reporting_count,
        })
    }

    /// Enabled virtual pools that list `pool_id` as a member.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn containing(&self, pool_id: PoolId) -> Result<Vec<VirtualPoolConfig>, MonitorError> {
        let configs = self.pools.list_enabled_virtual_pools().await?;
        Ok(configs
            .into_iter()
            .filter(|c| c.member_pool_ids.contains(&pool_id))
            .collect())
    }

    /// The supported strategies.
    #[must_use]
    pub fn strategies() -> Vec<StrategyInfo> {
        AggregateStrategy::ALL
            .iter()
            .map(|s| StrategyInfo {
                value: *s,
                label: s.label().to_string(),
                description: s.description().to_string(),
            })
            .collect()
    }
}
