//! Pressure arithmetic over pool counts.
//!
//! Pressure is a percentage with exactly two decimals. It is held as an
//! integer number of hundredths so rounding is exact: every ratio is
//! rounded half-up once, at the point it is produced.
//!
//! Two ratios exist and they deliberately point in opposite directions:
//!
//! - [`Pressure::stress`] is recorded on every snapshot and measures the
//!   non-valid fraction `(invalid + cooling) / total`.
//! - [`Pressure::health`] is reported for aggregated virtual pools and
//!   measures the valid fraction `valid / total`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Raw resource counts reported for a pool.
///
/// `total_count` is the authoritative denominator even when it does not
/// equal the sum of the other three fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Counts {
    /// Resources currently usable.
    pub valid_count: i64,
    /// Resources known to be unusable.
    pub invalid_count: i64,
    /// Resources temporarily cooling down.
    pub cooling_count: i64,
    /// Total resources in the pool.
    pub total_count: i64,
}

impl Counts {
    /// Creates a count set.
    #[must_use]
    pub const fn new(valid: i64, invalid: i64, cooling: i64, total: i64) -> Self {
        Self {
            valid_count: valid,
            invalid_count: invalid,
            cooling_count: cooling,
            total_count: total,
        }
    }

    /// Returns `true` if any field is negative.
    #[must_use]
    pub const fn has_negative(&self) -> bool {
        self.valid_count < 0 || self.invalid_count < 0 || self.cooling_count < 0 || self.total_count < 0
    }

    /// Returns `true` if `total = valid + invalid + cooling`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.valid_count
            .checked_add(self.invalid_count)
            .and_then(|s| s.checked_add(self.cooling_count))
            == Some(self.total_count)
    }

    /// Field-wise saturating sum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            valid_count: self.valid_count.saturating_add(other.valid_count),
            invalid_count: self.invalid_count.saturating_add(other.invalid_count),
            cooling_count: self.cooling_count.saturating_add(other.cooling_count),
            total_count: self.total_count.saturating_add(other.total_count),
        }
    }
}

/// A percentage in `[0, 100]` with two decimals, stored as hundredths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = f64)]
pub struct Pressure(u32);

impl Pressure {
    /// 0.00
    pub const ZERO: Self = Self(0);
    /// 100.00
    pub const MAX: Self = Self(10_000);

    /// Const constructor from hundredths, saturating at 100.00.
    #[must_use]
    pub const fn new(hundredths: u32) -> Self {
        if hundredths > Self::MAX.0 {
            Self::MAX
        } else {
            Self(hundredths)
        }
    }

    /// Builds a pressure from hundredths of a percent, clamped to `[0, 10000]`.
    #[must_use]
    pub fn from_hundredths(hundredths: i64) -> Self {
        let clamped = hundredths.clamp(0, i64::from(Self::MAX.0));
        Self(u32::try_from(clamped).unwrap_or(Self::MAX.0))
    }

    /// Builds a pressure from a percentage, rounding half-up to two decimals.
    ///
    /// Non-finite input yields zero.
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if !percent.is_finite() {
            return Self::ZERO;
        }
        #[allow(clippy::cast_possible_truncation)]
        let hundredths = (percent * 100.0 + 0.5).floor() as i64;
        Self::from_hundredths(hundredths)
    }

    /// `numerator / denominator * 100`, rounded half-up to two decimals.
    ///
    /// A non-positive denominator or a negative numerator yields zero.
    /// Results above 100 are clamped.
    #[must_use]
    pub fn ratio(numerator: i64, denominator: i64) -> Self {
        if denominator <= 0 || numerator <= 0 {
            return Self::ZERO;
        }
        let n = i128::from(numerator);
        let d = i128::from(denominator);
        // round_half_up(n * 10000 / d) in integers
        let hundredths = (n * 20_000 + d) / (2 * d);
        Self::from_hundredths(i64::try_from(hundredths).unwrap_or(i64::MAX))
    }

    /// Snapshot pressure: share of resources that are not valid.
    #[must_use]
    pub fn stress(counts: &Counts) -> Self {
        let stressed = counts
            .invalid_count
            .max(0)
            .saturating_add(counts.cooling_count.max(0));
        Self::ratio(stressed, counts.total_count)
    }

    /// Aggregated pressure: share of resources that are valid.
    #[must_use]
    pub fn health(counts: &Counts) -> Self {
        Self::ratio(counts.valid_count, counts.total_count)
    }

    /// Half-up mean of a set of pressures, `None` when empty.
    #[must_use]
    pub fn mean<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let (sum, n) = values
            .into_iter()
            .fold((0_i128, 0_i128), |(sum, n), p| (sum + i128::from(p.0), n + 1));
        if n == 0 {
            return None;
        }
        let hundredths = (2 * sum + n) / (2 * n);
        Some(Self::from_hundredths(i64::try_from(hundredths).unwrap_or(i64::MAX)))
    }

    /// Returns the raw hundredths value.
    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// Returns the value as a percentage (`78.95`).
    #[must_use]
    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Pressure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

impl<'de> Deserialize<'de> for Pressure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::from_percent)
    }
}
