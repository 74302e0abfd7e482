//! Playoff Odds CLI
//!
//! One-shot maintenance commands against the snapshot history.
//!
//! Usage:
//!   cargo run --bin odds_cli -- scrape                      # live page
//!   cargo run --bin odds_cli -- scrape --html-file page.html
//!   cargo run --bin odds_cli -- export --out backup.json
//!   cargo run --bin odds_cli -- import backup.json
//!   cargo run --bin odds_cli -- stats

use anyhow::{bail, Context, Result};
use chrono::SubsecRound;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use playoff_odds::{
    config::{self, resolve_data_path, Config},
    history::{DbSnapshotStore, SnapshotStore, TimeSeriesBuilder},
    ingest::IngestPipeline,
    models::Snapshot,
    scrapers::{canonical_team_name, HttpPageSource, PageSource, StaticPageSource},
};

#[derive(Parser, Debug)]
#[command(name = "odds_cli")]
#[command(about = "Maintain the playoff probability history")]
struct Args {
    /// Path to SQLite database (defaults to DATABASE_PATH / DB_PATH)
    #[arg(long, env = "DATABASE_PATH")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one ingest cycle and print the report
    Scrape {
        /// Read the page from a saved HTML file instead of the network
        #[arg(long)]
        html_file: Option<String>,
    },

    /// Write every snapshot as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<String>,
    },

    /// Load snapshots from an export file; existing rows are left alone
    Import { path: String },

    /// Print history statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odds_cli=info,playoff_odds=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let db_path = match args.db {
        Some(path) => resolve_data_path(Some(path), "playoff_odds.db"),
        None => config.database_path.clone(),
    };
    let store = Arc::new(DbSnapshotStore::new(&db_path)?);

    match args.command {
        Commands::Scrape { html_file } => scrape(&config, store, html_file).await?,
        Commands::Export { out } => export(store.as_ref(), out.as_deref())?,
        Commands::Import { path } => import(store.as_ref(), &path)?,
        Commands::Stats => stats(&store)?,
    }

    Ok(())
}

async fn scrape(
    config: &Config,
    store: Arc<DbSnapshotStore>,
    html_file: Option<String>,
) -> Result<()> {
    let source: Arc<dyn PageSource> = match html_file {
        Some(path) => Arc::new(StaticPageSource::from_file(&path)?),
        None => Arc::new(HttpPageSource::new(&config.source_url, config.http_timeout)?),
    };

    let pipeline =
        IngestPipeline::new(source, store).with_expected_teams(config.expected_teams);
    let report = pipeline.run_cycle().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn export(store: &dyn SnapshotStore, out: Option<&str>) -> Result<()> {
    let snapshots = TimeSeriesBuilder::new(store).export()?;
    let json = serde_json::to_string_pretty(&snapshots)?;

    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            info!("💾 Exported {} snapshots to {}", snapshots.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn import(store: &dyn SnapshotStore, path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let snapshots: Vec<Snapshot> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a snapshot export", path))?;

    let snapshots = prepare_import(snapshots)?;
    let inserted = store.append_batch(&snapshots)?;

    info!(
        "📥 Imported {} new snapshots ({} already present)",
        inserted,
        snapshots.len() - inserted
    );
    Ok(())
}

/// Canonicalize and check every record before anything is written
fn prepare_import(snapshots: Vec<Snapshot>) -> Result<Vec<Snapshot>> {
    snapshots
        .into_iter()
        .enumerate()
        .map(|(i, mut s)| {
            s.team_name = canonical_team_name(&s.team_name);
            if s.team_name.is_empty() {
                bail!("record {} has an empty team name", i);
            }
            if let Some((field, value)) = s.probabilities.first_out_of_range() {
                bail!("record {} ({}): {} = {} is outside [0, 1]", i, s.team_name, field, value);
            }
            s.captured_at = s.captured_at.trunc_subsecs(6);
            Ok(s)
        })
        .collect()
}

fn stats(store: &DbSnapshotStore) -> Result<()> {
    println!("Snapshots:      {}", store.len()?);
    println!("Teams:          {}", store.team_count()?);
    match store.latest_capture()? {
        Some(ts) => println!("Latest capture: {}", ts.to_rfc3339()),
        None => println!("Latest capture: never"),
    }
    Ok(())
}
