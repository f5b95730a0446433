//! Per-connection subscription manager.
//!
//! Tracks which pools a WebSocket client is subscribed to and provides
//! server-side event filtering.

use std::collections::HashSet;

use crate::domain::PoolId;

/// Manages the set of pool subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed pool IDs. If `subscribe_all` is true, this set is ignored.
    pool_ids: HashSet<PoolId>,
    /// Whether the client subscribes to all pools (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds pool IDs to the subscription set. `wildcard` enables `"*"`.
    pub fn subscribe(&mut self, ids: &[PoolId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.pool_ids.extend(ids.iter().copied());
    }

    /// Removes pool IDs from the subscription set. `wildcard` clears `"*"`.
    pub fn unsubscribe(&mut self, ids: &[PoolId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.pool_ids.remove(id);
        }
    }

    /// Returns `true` if an event about `pool_id` should be forwarded.
    ///
    /// Events about no particular pool (batch results, purges) go to every
    /// client with at least one subscription.
    #[must_use]
    pub fn matches(&self, pool_id: Option<PoolId>) -> bool {
        match pool_id {
            Some(id) => self.subscribe_all || self.pool_ids.contains(&id),
            None => self.subscribe_all || !self.pool_ids.is_empty(),
        }
    }

    /// Returns the number of explicitly subscribed pool IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pool_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i64) -> PoolId {
        PoolId::new(n)
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(Some(id(1))));
        assert!(!mgr.matches(None));
    }

    #[test]
    fn subscribe_specific_pool() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id(1)], false);
        assert!(mgr.matches(Some(id(1))));
        assert!(!mgr.matches(Some(id(2))));
        assert!(mgr.matches(None));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(Some(id(1))));
        assert!(mgr.matches(Some(id(2))));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.matches(Some(id(1))));
    }

    #[test]
    fn unsubscribe_removes_pool() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id(1)], false);
        mgr.unsubscribe(&[id(1)], false);
        assert!(!mgr.matches(Some(id(1))));
        assert_eq!(mgr.count(), 0);
    }
}
