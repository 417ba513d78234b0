//! ghflow runtime
//!
//! Wires the ingestion pipeline to the read API:
//! - Opens the SQLite event store (schema applied on open)
//! - Creates the shared EventAggregator
//! - Spawns the single-flight fetch scheduler
//! - Serves the HTTP API until CTRL+C or `POST /shutdown`
//!
//! Usage:
//!   cargo run --release --bin ghflow
//!
//! Environment variables:
//!   GITHUB_ACCESS_TOKEN - Upstream token (read on every cycle)
//!   GHFLOW_DB_PATH - SQLite database path (default: data/ghflow.db)
//!   FETCH_INTERVAL_SECS - Fetch interval (default: 60)
//!   HTTP_BIND_ADDR - API address (default: 0.0.0.0:8080)
//!   See `IngestConfig::from_env` for the full list.

use dotenv::dotenv;
use ghflow::api::{self, ApiState};
use ghflow::pipeline::{
    Credential, EventAggregator, EventSource, EventStore, FetchCycle, FetchScheduler,
    GitHubEventSource, IngestConfig, SqliteEventStore,
};
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Starting ghflow v{}", env!("CARGO_PKG_VERSION"));

    let config = IngestConfig::from_env()?;

    info!("📊 Configuration:");
    info!("   ├─ Events URL: {}", config.events_url);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Fetch interval: {}s", config.fetch_interval_secs);
    info!("   ├─ Upstream timeout: {}s", config.upstream_timeout_secs);
    info!("   ├─ Retention: {} day(s)", config.retention_days);
    info!(
        "   ├─ Tracker bounds: actors={} repo_urls={} emails={}",
        config.actors_capacity,
        config.repo_urls_capacity,
        config
            .emails_capacity
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    info!("   └─ API: http://{}", config.http_bind_addr);

    if env::var(&config.token_env_var).map(|t| t.trim().is_empty()).unwrap_or(true) {
        warn!(
            "⚠️  {} is not set; fetch cycles will be skipped until it is",
            config.token_env_var
        );
    }

    let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open(&config.db_path)?);
    let source: Arc<dyn EventSource> = Arc::new(GitHubEventSource::new(
        config.events_url.clone(),
        Credential::Env(config.token_env_var.clone()),
        config.upstream_timeout(),
    )?);
    let aggregator = Arc::new(EventAggregator::with_capacities(config.tracker_capacities()));

    let cycle = Arc::new(FetchCycle::new(source, aggregator.clone(), store.clone()));
    let scheduler = Arc::new(FetchScheduler::new(cycle, config.fetch_interval()));

    let scheduler_task = tokio::spawn(scheduler.clone().run(config.fetch_on_startup));
    info!("✅ Fetch scheduler spawned");

    let shutdown = Arc::new(Notify::new());
    let state = ApiState {
        aggregator,
        store,
        scheduler,
        retention: config.retention(),
        shutdown: shutdown.clone(),
    };

    let (addr, server) = warp::serve(api::routes(state)).try_bind_with_graceful_shutdown(
        config.http_bind_addr,
        async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                    Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
                },
                _ = shutdown.notified() => info!("⚠️  Received shutdown request, shutting down..."),
            }
        },
    )?;

    info!("✅ API listening on http://{}", addr);
    info!("🔄 Press CTRL+C to shutdown gracefully");

    server.await;

    scheduler_task.abort();
    info!("✅ ghflow stopped");
    Ok(())
}
