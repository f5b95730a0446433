//! Type-safe pool identifiers.
//!
//! Pool and virtual-pool rows are owned by the configuration store, which
//! assigns 64-bit integer keys. [`PoolId`] and [`VirtualPoolId`] wrap those
//! keys so the two kinds of identifier cannot be confused.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a monitored pool.
///
/// Used as the key of snapshot series, the target of manual polls, and the
/// member reference inside virtual pool configurations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PoolId(i64);

impl PoolId {
    /// Wraps a raw store key.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PoolId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<PoolId> for i64 {
    fn from(id: PoolId) -> Self {
        id.0
    }
}

/// Identifier of a virtual (composite) pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct VirtualPoolId(i64);

impl VirtualPoolId {
    /// Wraps a raw store key.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for VirtualPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VirtualPoolId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn display_is_raw_key() {
        assert_eq!(PoolId::new(42).to_string(), "42");
        assert_eq!(VirtualPoolId::new(7).to_string(), "7");
    }

    #[test]
    fn serializes_as_plain_integer() {
        let Ok(json) = serde_json::to_string(&PoolId::new(9)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "9");
    }

    #[test]
    fn usable_as_json_map_key() {
        let Ok(map) = serde_json::from_str::<BTreeMap<PoolId, f64>>(r#"{"1": 2.0, "3": 0.5}"#)
        else {
            panic!("map keys should parse as pool ids");
        };
        assert_eq!(map.get(&PoolId::new(1)), Some(&2.0));
        assert_eq!(map.get(&PoolId::new(3)), Some(&0.5));
    }

    #[test]
    fn orders_by_key() {
        assert!(PoolId::new(1) < PoolId::new(2));
        assert_eq!(i64::from(PoolId::from(5)), 5);
    }
}
