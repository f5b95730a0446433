//! Pure operations over an ascending snapshot series.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Pressure, StatusSnapshot};

/// Inclusive time range in epoch milliseconds; `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound, inclusive.
    pub start: Option<i64>,
    /// Upper bound, inclusive.
    pub end: Option<i64>,
}

impl TimeRange {
    /// An unbounded range.
    pub const ALL: Self = Self {
        start: None,
        end: None,
    };

    /// Creates a range from optional bounds.
    #[must_use]
    pub const fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `at` lies within the range.
    #[must_use]
    pub fn contains(&self, at: i64) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Items across all pages.
    pub total: u64,
    /// Zero-based page index.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
}

/// Summary of a snapshot range.
///
/// All fields except `record_count` are `None` for an empty range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SeriesStatistics {
    /// Number of snapshots in the range.
    pub record_count: u64,
    /// Mean stress pressure, half-up to two decimals.
    #[schema(value_type = Option<f64>)]
    pub average_pressure: Option<Pressure>,
    /// Largest valid count.
    pub max_valid_count: Option<i64>,
    /// Smallest valid count.
    pub min_valid_count: Option<i64>,
}

/// Thins an ascending series so kept samples are at least
/// `interval_secs` apart.
///
/// The first sample is always kept. A later sample is kept only when it is
/// at least the interval after the last kept sample. A missing or
/// non-positive interval returns the series unchanged.
#[must_use]
pub fn decimate(series: Vec<StatusSnapshot>, interval_secs: Option<i64>) -> Vec<StatusSnapshot> {
    let Some(step) = interval_secs.filter(|s| *s > 0).map(|s| s.saturating_mul(1_000)) else {
        return series;
    };
    let mut kept: Vec<StatusSnapshot> = Vec::with_capacity(series.len());
    let mut last_kept: Option<i64> = None;
    for snapshot in series {
        let keep = last_kept.is_none_or(|last| snapshot.recorded_at.saturating_sub(last) >= step);
        if keep {
            last_kept = Some(snapshot.recorded_at);
            kept.push(snapshot);
        }
    }
    kept
}

/// Summarises a series.
#[must_use]
pub fn statistics(series: &[StatusSnapshot]) -> SeriesStatistics {
    SeriesStatistics {
        record_count: series.len() as u64,
        average_pressure: Pressure::mean(series.iter().map(|s| s.pressure)),
        max_valid_count: series.iter().map(|s| s.counts.valid_count).max(),
        min_valid_count: series.iter().map(|s| s.counts.valid_count).min(),
    }
}
