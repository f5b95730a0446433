//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::MonitorService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Facade over polling, queries, aggregation and diagnostics.
    pub monitor: Arc<MonitorService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Retention applied by `DELETE /status/expired` when none is given.
    pub retention_days: u32,
}

impl AppState {
    /// Builds the state around a service, sharing its event bus.
    #[must_use]
    pub fn new(monitor: Arc<MonitorService>, retention_days: u32) -> Self {
        let event_bus = monitor.event_bus().clone();
        Self {
            monitor,
            event_bus,
            retention_days,
        }
    }
}
