//! Shared query parameter types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::{PoolId, TimeRange};

/// Inclusive time window in epoch milliseconds. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeParams {
    /// Lower bound, epoch milliseconds.
    #[serde(default)]
    pub start: Option<i64>,
    /// Upper bound, epoch milliseconds.
    #[serde(default)]
    pub end: Option<i64>,
}

impl RangeParams {
    /// Converts to the domain range.
    #[must_use]
    pub const fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Time window plus a decimation interval.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendParams {
    /// Lower bound, epoch milliseconds.
    #[serde(default)]
    pub start: Option<i64>,
    /// Upper bound, epoch milliseconds.
    #[serde(default)]
    pub end: Option<i64>,
    /// Minimum spacing between kept samples; absent or ≤ 0 keeps all.
    #[serde(default)]
    pub interval_secs: Option<i64>,
}

/// Pagination and filter parameters for the history endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Restrict to one pool.
    #[serde(default)]
    pub pool_id: Option<PoolId>,
    /// Lower bound, epoch milliseconds.
    #[serde(default)]
    pub start: Option<i64>,
    /// Upper bound, epoch milliseconds.
    #[serde(default)]
    pub end: Option<i64>,
    /// Page number (0-indexed). Defaults to 0.
    #[serde(default)]
    pub page: u32,
    /// Items per page (max 1000). Defaults to 20.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

impl HistoryParams {
    /// Converts the bounds to the domain range.
    #[must_use]
    pub const fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Optional pressure threshold override.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ThresholdParams {
    /// Pressure percentage; defaults to the configured threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Optional retention override for the purge endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RetentionParams {
    /// Days to keep; defaults to the configured retention.
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn history_defaults() {
        let Ok(params) = serde_json::from_str::<HistoryParams>("{}") else {
            panic!("empty object should deserialize");
        };
        assert_eq!(params.page, 0);
        assert_eq!(params.page_size, 20);
        assert_eq!(params.range(), TimeRange::ALL);
    }

    #[test]
    fn history_pool_filter() {
        let Ok(params) =
            serde_json::from_str::<HistoryParams>(r#"{"pool_id": 7, "start": 10, "page": 2}"#)
        else {
            panic!("valid params should deserialize");
        };
        assert_eq!(params.pool_id, Some(PoolId::new(7)));
        assert_eq!(params.range(), TimeRange::new(Some(10), None));
    }
}
