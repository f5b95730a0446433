//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use super::dto::{LatestBatchRequest, PurgeResponse, TestConnectionRequest, TestFetchRequest};
use super::handlers::{providers, status, system, tasks, virtual_pool};
use crate::domain::{
    AggregateStrategy, Counts, NamedSnapshot, PollStatus, PoolId, SeriesStatistics,
    SnapshotCandidate, SourceTag, StatusSnapshot, VirtualPoolConfig, VirtualPoolDraft,
    VirtualPoolId,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::provider::ProviderDescriptor;
use crate::service::{
    AbnormalCheck, AggregatedStatus, BatchOutcome, BatchPhase, BatchReport, ConnectionHealthReport,
    ConnectionState, ConnectionTest, FetchTest, ManualSnapshot, OverallHealth, PoolConnectivity,
    PressureDistribution, StatusOverview, StrategyInfo, TaskStatistics, UnitReport,
    ValidationResult,
};

/// The service's OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "pool-pulse",
        description = "Polling and aggregation engine tracking the health of externally managed resource pools"
    ),
    paths(
        tasks::poll_all,
        tasks::poll_one,
        tasks::statistics,
        status::latest_all,
        status::latest_one,
        status::latest_batch,
        status::history,
        status::trend,
        status::statistics,
        status::overview,
        status::high_pressure,
        status::pressure_distribution,
        status::abnormal,
        status::save,
        status::save_batch,
        status::purge_expired,
        virtual_pool::all_statuses,
        virtual_pool::status,
        virtual_pool::validate,
        virtual_pool::preview,
        virtual_pool::strategies,
        virtual_pool::containing,
        providers::list,
        providers::test_connection,
        providers::test_fetch,
        system::health_handler,
        system::connections_handler,
    ),
    components(schemas(
        PoolId,
        VirtualPoolId,
        Counts,
        SourceTag,
        PollStatus,
        AggregateStrategy,
        StatusSnapshot,
        NamedSnapshot,
        SnapshotCandidate,
        SeriesStatistics,
        VirtualPoolConfig,
        VirtualPoolDraft,
        ManualSnapshot,
        StatusOverview,
        PressureDistribution,
        AbnormalCheck,
        AggregatedStatus,
        ValidationResult,
        StrategyInfo,
        BatchOutcome,
        BatchPhase,
        BatchReport,
        UnitReport,
        TaskStatistics,
        ConnectionState,
        OverallHealth,
        PoolConnectivity,
        ConnectionHealthReport,
        ConnectionTest,
        FetchTest,
        ProviderDescriptor,
        LatestBatchRequest,
        PurgeResponse,
        TestConnectionRequest,
        TestFetchRequest,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Tasks", description = "Polling triggers"),
        (name = "Status", description = "Snapshot queries and manual saves"),
        (name = "Virtual pools", description = "On-demand aggregation"),
        (name = "Providers", description = "Provider catalog and diagnostics"),
        (name = "System", description = "Process and connection health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/tasks/poll-all",
            "/api/v1/status/history",
            "/api/v1/virtual-pools/preview",
            "/api/v1/providers/{id}/test-fetch",
            "/health/connections",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
