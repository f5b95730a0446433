//! Domain layer: identifiers, configuration records, snapshots, pressure
//! arithmetic, series operations and the event system.

pub mod event;
pub mod event_bus;
pub mod pool_config;
pub mod pool_id;
pub mod pressure;
pub mod series;
pub mod snapshot;

pub use event::MonitorEvent;
pub use event_bus::EventBus;
pub use pool_config::{
    AggregateStrategy, PollResult, PollStatus, PoolConfig, ProviderConfig, VirtualPoolConfig,
    VirtualPoolDraft,
};
pub use pool_id::{PoolId, VirtualPoolId};
pub use pressure::{Counts, Pressure};
pub use series::{Page, SeriesStatistics, TimeRange};
pub use snapshot::{
    NamedSnapshot, NewSnapshot, SnapshotCandidate, SourceTag, StatusSnapshot, now_millis,
};
