//! Broadcast channel for monitor events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The polling
//! orchestrator and retention sweeper publish [`MonitorEvent`]s through
//! the bus, and every WebSocket connection subscribes to it.

use tokio::sync::broadcast;

use super::MonitorEvent;

/// Broadcast bus for [`MonitorEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). Lagging receivers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event; zero when
    /// nobody is listening.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a receiver for all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PoolId, Pressure};
    use chrono::Utc;

    fn recorded(pool_id: i64) -> MonitorEvent {
        MonitorEvent::SnapshotRecorded {
            pool_id: PoolId::new(pool_id),
            snapshot_id: 1,
            pressure: Pressure::ZERO,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(recorded(1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(recorded(7)), 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.pool_id(), Some(PoolId::new(7)));
        assert_eq!(e2.pool_id(), Some(PoolId::new(7)));
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
