//! Status snapshots: immutable, timestamped measurements of a pool.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Counts, PoolId, Pressure};
use crate::error::ProviderError;

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Recorded by the polling orchestrator.
    #[default]
    System,
    /// Saved through the manual save operations.
    Manual,
}

impl SourceTag {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown source tag: {other}")),
        }
    }
}

/// Counts returned by a provider, before pressure is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SnapshotCandidate {
    /// Raw counts.
    #[serde(flatten)]
    pub counts: Counts,
    /// Measurement time in epoch milliseconds; `None` means "now".
    #[serde(default)]
    pub recorded_at: Option<i64>,
    /// Free-form note.
    #[serde(default)]
    pub remarks: Option<String>,
}

impl SnapshotCandidate {
    /// Creates a candidate measured now.
    #[must_use]
    pub const fn new(counts: Counts) -> Self {
        Self {
            counts,
            recorded_at: None,
            remarks: None,
        }
    }

    /// Rejects counts no pool can have.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MalformedResult`] if any count is negative.
    pub fn validate(self) -> Result<Self, ProviderError> {
        if self.counts.has_negative() {
            return Err(ProviderError::MalformedResult(format!(
                "negative count in {:?}",
                self.counts
            )));
        }
        Ok(self)
    }
}

/// A snapshot ready to be appended; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    /// Measured pool.
    pub pool_id: PoolId,
    /// Raw counts.
    pub counts: Counts,
    /// Stress pressure derived from `counts`.
    pub pressure: Pressure,
    /// Measurement time, epoch milliseconds.
    pub recorded_at: i64,
    /// Origin.
    pub source_tag: SourceTag,
    /// Free-form note.
    pub remarks: Option<String>,
    /// Failure reason for zero-filled error snapshots.
    pub error: Option<String>,
}

impl NewSnapshot {
    /// Builds a snapshot from provider counts, deriving pressure.
    #[must_use]
    pub fn from_candidate(
        pool_id: PoolId,
        candidate: SnapshotCandidate,
        source_tag: SourceTag,
        now_millis: i64,
    ) -> Self {
        Self {
            pool_id,
            pressure: Pressure::stress(&candidate.counts),
            counts: candidate.counts,
            recorded_at: candidate.recorded_at.unwrap_or(now_millis),
            source_tag,
            remarks: candidate.remarks,
            error: None,
        }
    }

    /// Builds the zero-filled snapshot recorded when a fetch fails.
    #[must_use]
    pub fn failed(pool_id: PoolId, err: &ProviderError, now_millis: i64) -> Self {
        Self {
            pool_id,
            counts: Counts::default(),
            pressure: Pressure::ZERO,
            recorded_at: now_millis,
            source_tag: SourceTag::System,
            remarks: Some(format!("poll failed: {}", err.kind())),
            error: Some(err.to_string()),
        }
    }

    /// Attaches the store-assigned fields.
    #[must_use]
    pub fn into_snapshot(self, id: i64, created_at: i64) -> StatusSnapshot {
        StatusSnapshot {
            id,
            pool_id: self.pool_id,
            counts: self.counts,
            pressure: self.pressure,
            recorded_at: self.recorded_at,
            source_tag: self.source_tag,
            remarks: self.remarks,
            error: self.error,
            created_at,
        }
    }
}

/// A persisted snapshot. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusSnapshot {
    /// Store key.
    pub id: i64,
    /// Measured pool.
    pub pool_id: PoolId,
    /// Raw counts.
    #[serde(flatten)]
    pub counts: Counts,
    /// Stress pressure, `(invalid + cooling) / total`.
    pub pressure: Pressure,
    /// Measurement time, epoch milliseconds.
    pub recorded_at: i64,
    /// Origin.
    pub source_tag: SourceTag,
    /// Free-form note.
    pub remarks: Option<String>,
    /// Failure reason; set only on zero-filled error snapshots.
    pub error: Option<String>,
    /// Insertion time, epoch milliseconds.
    pub created_at: i64,
}

impl StatusSnapshot {
    /// Returns `true` if this snapshot records a failed fetch rather than
    /// a measurement.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A snapshot decorated with its pool's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NamedSnapshot {
    /// Pool display name.
    pub pool_name: String,
    /// The snapshot itself.
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn candidate_pressure_is_derived() {
        let candidate = SnapshotCandidate::new(Counts::new(10, 2, 1, 13));
        let snapshot = NewSnapshot::from_candidate(PoolId::new(1), candidate, SourceTag::System, 500);
        assert_eq!(snapshot.pressure.to_string(), "23.08");
        assert_eq!(snapshot.recorded_at, 500);
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn explicit_recorded_at_is_kept() {
        let candidate = SnapshotCandidate {
            recorded_at: Some(42),
            ..SnapshotCandidate::new(Counts::new(1, 0, 0, 1))
        };
        let snapshot = NewSnapshot::from_candidate(PoolId::new(1), candidate, SourceTag::Manual, 500);
        assert_eq!(snapshot.recorded_at, 42);
        assert_eq!(snapshot.source_tag, SourceTag::Manual);
    }

    #[test]
    fn failed_snapshot_is_zero_filled_and_flagged() {
        let err = ProviderError::Timeout("slow".to_string());
        let snapshot = NewSnapshot::failed(PoolId::new(5), &err, 1_000).into_snapshot(1, 1_000);
        assert_eq!(snapshot.counts, Counts::default());
        assert_eq!(snapshot.pressure, Pressure::ZERO);
        assert!(snapshot.is_error());
        assert_eq!(snapshot.source_tag, SourceTag::System);
    }

    #[test]
    fn negative_counts_are_malformed() {
        let candidate = SnapshotCandidate::new(Counts::new(-1, 0, 0, 0));
        let Err(err) = candidate.validate() else {
            panic!("negative count should be rejected");
        };
        assert!(matches!(err, ProviderError::MalformedResult(_)));
    }

    #[test]
    fn snapshot_serializes_flat() {
        let snapshot = NewSnapshot::from_candidate(
            PoolId::new(2),
            SnapshotCandidate::new(Counts::new(15, 3, 1, 19)),
            SourceTag::System,
            7,
        )
        .into_snapshot(11, 8);
        let Ok(value) = serde_json::to_value(&snapshot) else {
            panic!("serialization failed");
        };
        assert_eq!(value["valid_count"], 15);
        assert_eq!(value["total_count"], 19);
        assert_eq!(value["source_tag"], "system");
        assert_eq!(value["pool_id"], 2);
    }
}
