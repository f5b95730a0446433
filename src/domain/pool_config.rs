//! Pool and virtual-pool configuration records.
//!
//! These rows are owned by the configuration store. The monitor reads them
//! and only ever writes back the `last_poll_*` fields of a [`PoolConfig`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PoolId, VirtualPoolId};
use crate::error::ProviderError;

/// Opaque provider configuration blob attached to a pool.
pub type ProviderConfig = serde_json::Map<String, serde_json::Value>;

/// Outcome of the most recent fetch attempt for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// The provider returned usable counts.
    Success,
    /// The provider failed or could not be resolved.
    Failed,
    /// The provider did not answer in time.
    Timeout,
}

impl PollStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown poll status: {other}")),
        }
    }
}

/// A monitored pool as stored by the configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PoolConfig {
    /// Store key.
    pub id: PoolId,
    /// Display name, passed to the provider on every fetch.
    pub name: String,
    /// Identifier of the provider registered for this pool.
    pub provider_id: String,
    /// Provider-specific configuration.
    #[schema(value_type = Object)]
    #[serde(default)]
    pub provider_config: ProviderConfig,
    /// Preferred polling interval. Informational; the orchestrator polls
    /// every enabled pool on each batch.
    pub poll_interval_secs: u64,
    /// Disabled pools are skipped by polling and health checks.
    pub enabled: bool,
    /// Result of the most recent fetch attempt.
    #[serde(default)]
    pub last_poll_status: Option<PollStatus>,
    /// Failure reason of the most recent fetch attempt, if it failed.
    #[serde(default)]
    pub last_poll_error: Option<String>,
    /// Epoch milliseconds of the most recent fetch attempt.
    #[serde(default)]
    pub last_poll_at: Option<i64>,
}

impl PoolConfig {
    /// Creates an enabled pool with a 60 second interval and no poll history.
    #[must_use]
    pub fn new(id: PoolId, name: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            provider_id: provider_id.into(),
            provider_config: ProviderConfig::new(),
            poll_interval_secs: 60,
            enabled: true,
            last_poll_status: None,
            last_poll_error: None,
            last_poll_at: None,
        }
    }

    /// Replaces the provider configuration.
    #[must_use]
    pub fn with_provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_config = config;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Applies a write-back to the `last_poll_*` fields.
    pub fn apply_poll_result(&mut self, result: &PollResult) {
        self.last_poll_status = Some(result.status);
        self.last_poll_error.clone_from(&result.error);
        self.last_poll_at = Some(result.at_millis);
    }
}

/// The write-back recorded on a pool after every fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PollResult {
    /// Attempt outcome.
    pub status: PollStatus,
    /// Failure reason, `None` on success.
    pub error: Option<String>,
    /// Epoch milliseconds of the attempt.
    pub at_millis: i64,
}

impl PollResult {
    /// A successful attempt.
    #[must_use]
    pub const fn success(at_millis: i64) -> Self {
        Self {
            status: PollStatus::Success,
            error: None,
            at_millis,
        }
    }

    /// A failed attempt, classified by the provider error.
    #[must_use]
    pub fn failure(err: &ProviderError, at_millis: i64) -> Self {
        Self {
            status: err.poll_status(),
            error: Some(err.to_string()),
            at_millis,
        }
    }
}

/// How a virtual pool combines its members' counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStrategy {
    /// Field-wise sum.
    #[default]
    Sum,
    /// Field-wise mean, truncated.
    Average,
    /// Field-wise weighted mean, truncated.
    Weighted,
}

impl AggregateStrategy {
    /// Every supported strategy.
    pub const ALL: [Self; 3] = [Self::Sum, Self::Average, Self::Weighted];

    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Weighted => "weighted",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sum => "Sum",
            Self::Average => "Average",
            Self::Weighted => "Weighted average",
        }
    }

    /// One-line explanation for operators.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Sum => "Adds every count across member pools",
            Self::Average => "Averages every count across member pools, truncated to an integer",
            Self::Weighted => {
                "Weighted mean of every count using the configured pool weights (default 1), truncated to an integer"
            }
        }
    }
}

impl fmt::Display for AggregateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sum" => Ok(Self::Sum),
            "average" => Ok(Self::Average),
            "weighted" => Ok(Self::Weighted),
            other => Err(format!("unsupported aggregation strategy: {other}")),
        }
    }
}

/// A virtual (composite) pool as stored by the configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VirtualPoolConfig {
    /// Store key.
    pub id: VirtualPoolId,
    /// Display name.
    pub name: String,
    /// Member pools, in configuration order.
    pub member_pool_ids: Vec<PoolId>,
    /// Combination strategy.
    pub strategy: AggregateStrategy,
    /// Per-member weights, only consulted by [`AggregateStrategy::Weighted`].
    #[serde(default)]
    #[schema(value_type = Object)]
    pub weight_config: BTreeMap<PoolId, f64>,
    /// Disabled virtual pools are omitted from listings.
    pub enabled: bool,
    /// Sort key for listings, ascending.
    pub display_order: i32,
}

/// An unvalidated virtual pool configuration submitted for validation or
/// preview.
///
/// Unlike [`VirtualPoolConfig`] the strategy is free text, so an unknown
/// value can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VirtualPoolDraft {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Member pools.
    #[serde(default)]
    pub member_pool_ids: Vec<PoolId>,
    /// Strategy name; blank or absent means `sum`.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Per-member weights.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub weight_config: BTreeMap<PoolId, f64>,
}

impl VirtualPoolDraft {
    /// Parses the strategy, treating blank or absent as `sum`.
    ///
    /// # Errors
    ///
    /// Returns the rejection message for an unknown strategy name.
    pub fn parsed_strategy(&self) -> Result<AggregateStrategy, String> {
        match self.strategy.as_deref().map(str::trim) {
            None | Some("") => Ok(AggregateStrategy::Sum),
            Some(s) => s.parse(),
        }
    }
}

impl From<&VirtualPoolConfig> for VirtualPoolDraft {
    fn from(config: &VirtualPoolConfig) -> Self {
        Self {
            name: config.name.clone(),
            member_pool_ids: config.member_pool_ids.clone(),
            strategy: Some(config.strategy.as_str().to_string()),
            weight_config: config.weight_config.clone(),
        }
    }
}
