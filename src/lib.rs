//! # pool-pulse
//!
//! Polling and aggregation engine that tracks the health of externally
//! managed resource pools over time.
//!
//! Each pool is bound to a status provider. On a timer and on demand the
//! orchestrator fans out one fetch per enabled pool over a bounded worker
//! pool, records an immutable snapshot per pool and writes the outcome
//! back to the pool configuration. Virtual pools combine the latest
//! snapshots of their members on every request. A slower loop probes
//! provider connectivity, and a retention sweep purges old snapshots.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── MonitorService (service/)
//!     │     ├── PollingOrchestrator ── ProviderRegistry (provider/)
//!     │     ├── AggregationEngine
//!     │     ├── ConnectionHealthChecker
//!     │     └── RetentionSweeper
//!     ├── EventBus (domain/)
//!     │
//!     └── SnapshotStore + PoolConfigSource (persistence/)
//!           ├── in-memory
//!           └── PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod provider;
pub mod service;
pub mod ws;
