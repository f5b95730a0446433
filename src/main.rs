//! pool-pulse server entry point.
//!
//! Wires the stores, providers and service, starts the polling, connection
//! health and retention loops, and serves the REST and WebSocket API until
//! Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pool_pulse::api;
use pool_pulse::app_state::AppState;
use pool_pulse::config::{LogFormat, MonitorConfig};
use pool_pulse::domain::EventBus;
use pool_pulse::persistence::{
    InMemoryConfigStore, InMemorySnapshotStore, PoolConfigSource, PostgresConfigStore,
    PostgresSnapshotStore, SnapshotStore,
};
use pool_pulse::provider::ProviderRegistry;
use pool_pulse::service::{MonitorService, MonitorSettings, Shutdown};
use pool_pulse::ws::handler::ws_handler;

type Stores = (Arc<dyn SnapshotStore>, Arc<dyn PoolConfigSource>);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn build_stores(config: &MonitorConfig) -> anyhow::Result<Stores> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, snapshots are kept in memory");
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.seed_demo(config.demo_pools).await;
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
        let pools: Arc<dyn PoolConfigSource> = config_store;
        return Ok((snapshots, pools));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;
    tracing::info!("database ready");

    let snapshots: Arc<dyn SnapshotStore> = Arc::new(PostgresSnapshotStore::new(pool.clone()));
    let pools: Arc<dyn PoolConfigSource> = Arc::new(PostgresConfigStore::new(pool));
    Ok((snapshots, pools))
}

async fn wait_for_ctrl_c(shutdown: Shutdown) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown requested");
    shutdown.trigger();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting pool-pulse");

    // Stores and providers
    let (snapshots, pools) = build_stores(&config).await?;
    let providers = Arc::new(ProviderRegistry::with_builtin());
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Service layer
    let monitor = Arc::new(MonitorService::new(
        providers,
        snapshots,
        pools,
        event_bus,
        MonitorSettings::from(&config),
    ));

    // Background loops
    let shutdown = Shutdown::new();
    let mut loops = tokio::task::JoinSet::new();
    loops.spawn(
        monitor
            .poller()
            .clone()
            .run(config.poll_interval(), shutdown.subscribe()),
    );
    loops.spawn(
        monitor
            .health_checker()
            .clone()
            .run(config.health_check_interval(), shutdown.subscribe()),
    );
    loops.spawn(monitor.retention().clone().run(
        config.retention_days,
        config.retention_sweep_interval(),
        shutdown.subscribe(),
    ));

    // Router
    let app_state = AppState::new(monitor, config.retention_days);
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Serve until ctrl-c
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));
    let mut stopped = shutdown.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stopped.recv().await;
        })
        .await
        .context("serving HTTP")?;

    while loops.join_next().await.is_some() {}
    tracing::info!("pool-pulse stopped");
    Ok(())
}
