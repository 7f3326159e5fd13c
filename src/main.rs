//! place-harvester command line entry point
//!
//! ```bash
//! place-harvester --config harvester.toml          # one harvest pass
//! place-harvester --config harvester.toml score    # recompute weighted scores
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use place_harvester::application::{update_scores, Orchestrator, WorkerContext, WorkerSettings};
use place_harvester::infrastructure::{
    init_logging_with_config, log_system_info, AppConfig, ChromiumSessionFactory, SqlTaskSource,
    SqliteDocumentStore, SqliteStoreConnector,
};

#[derive(Parser, Debug)]
#[command(name = "place-harvester", version, about = "Harvest place attributes from the map application")]
struct Cli {
    /// Configuration file (defaults to the user config directory when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Harvest every pending place once
    #[default]
    Harvest,

    /// Recompute weighted scores of all harvested places
    Score,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| AppConfig::default_path().filter(|path| path.exists()));
    let config = AppConfig::load(config_path.as_deref()).context("Invalid configuration")?;

    init_logging_with_config(config.logging.clone())?;
    log_system_info();

    match cli.command.unwrap_or_default() {
        Command::Harvest => harvest(config).await,
        Command::Score => score(config).await,
    }
}

async fn harvest(config: AppConfig) -> Result<()> {
    let task_source = SqlTaskSource::connect(&config.task_source).await?;
    let task_source = Arc::new(task_source);

    let context = WorkerContext::new(
        Arc::new(ChromiumSessionFactory),
        Arc::new(SqliteStoreConnector::new(config.document_store.clone())),
        WorkerSettings::from_config(&config),
    );

    let report = Orchestrator::new(task_source.clone(), context).run().await?;
    task_source.close().await;

    info!(
        "✨ {} harvested, {} still pending for the next run",
        report.succeeded(),
        report.failed() + report.errored()
    );
    Ok(())
}

async fn score(config: AppConfig) -> Result<()> {
    let mut store = SqliteDocumentStore::open(&config.document_store).await?;
    let report = update_scores(&mut store, config.scoring.min_reviews).await;
    store.close_connection().await?;

    let report = report?;
    info!("✨ weighted_score written for {} of {} documents", report.updated, report.documents);
    Ok(())
}
