//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::MonitorEvent`]s
//! filtered by each client's pool subscriptions, and answers `latest`
//! lookups over the same socket.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
