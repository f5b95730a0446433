//! Service layer: polling, aggregation, connectivity and retention.
//!
//! [`MonitorService`] is the facade the API and the binary use. It wires
//! the [`PollingOrchestrator`], [`AggregationEngine`],
//! [`ConnectionHealthChecker`] and [`RetentionSweeper`] over the stores
//! and the provider registry. The three periodic loops share one
//! [`Shutdown`] signal.

pub mod aggregation;
pub mod health;
pub mod monitor_service;
pub mod poller;
pub mod retention;
pub mod shutdown;

pub use aggregation::{AggregatedStatus, AggregationEngine, StrategyInfo, ValidationResult};
pub use health::{
    ConnectionHealthChecker, ConnectionHealthReport, ConnectionState, OverallHealth,
    PoolConnectivity,
};
pub use monitor_service::{
    AbnormalCheck, ConnectionTest, FetchTest, ManualSnapshot, MonitorService, MonitorSettings,
    PressureDistribution, StatusOverview,
};
pub use poller::{
    BatchOutcome, BatchPhase, BatchReport, PollerSettings, PollingOrchestrator, TaskStatistics,
    UnitReport,
};
pub use retention::RetentionSweeper;
pub use shutdown::Shutdown;
