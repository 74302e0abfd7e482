//! Playoff Odds - postseason probability history service
//!
//! Scrapes the probability table on a fixed interval, records every real
//! change, and serves the history as chartable series over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playoff_odds::{
    api,
    config::{self, Config},
    history::{DbSnapshotStore, SnapshotStore},
    ingest::IngestPipeline,
    scheduler::IngestScheduler,
    scrapers::HttpPageSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    config::load_env();
    init_tracing();
    let config = Config::from_env();

    info!("🏈 Playoff Odds starting");

    let store = Arc::new(DbSnapshotStore::new(&config.database_path)?);
    info!(
        "📊 History: {} snapshots across {} teams",
        store.len()?,
        store.team_count()?
    );
    let store: Arc<dyn SnapshotStore> = store;

    let source = Arc::new(HttpPageSource::new(&config.source_url, config.http_timeout)?);
    let pipeline = IngestPipeline::new(source, store.clone())
        .with_expected_teams(config.expected_teams);
    let scheduler = Arc::new(IngestScheduler::new(Arc::new(pipeline)));

    // Timer ticks and POST /api/scrape share the scheduler's single-flight gate
    scheduler.spawn_interval(config.scrape_interval, config.scrape_on_startup);

    let app = api::create_router(store, scheduler);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playoff_odds=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
