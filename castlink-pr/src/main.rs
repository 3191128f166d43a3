//! castlink-pr - Performer Resolution batch jobs
//!
//! Answers "which performer(s) appear in this product?" for ingested
//! affiliate-catalog listings. Three jobs share the castlink.db in the
//! root folder:
//! - `resolve`: walk the unresolved-product backlog through the
//!   cache-then-network resolution cascade
//! - `cleanup`: merge duplicate performer identities and purge invalid data
//! - `ingest`: load crawler output into the lookup cache

use anyhow::Result;
use castlink_common::config::{RootFolderInitializer, RootFolderResolver};
use castlink_pr::config::PipelineConfig;
use castlink_pr::services::{
    CleanupEngine, CrawlerIngest, NameValidator, ResolutionRunner, SourceResolver, WikiIndexClient,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "castlink-pr", about = "CastLink performer resolution batch jobs")]
struct Cli {
    /// Root folder holding castlink.db and castlink.toml
    #[arg(long, global = true)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve performers for products without links
    Resolve {
        /// Override the configured job time budget (seconds)
        #[arg(long)]
        budget_secs: Option<u64>,
        /// Override the configured backlog batch limit
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Merge duplicate performer identities and purge invalid data
    Cleanup,
    /// Load a crawler dump (one JSON record per line) into the lookup cache
    Ingest {
        /// Crawl dump file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database delays
    info!(
        "Starting CastLink Performer Resolution (castlink-pr) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let resolver = RootFolderResolver::new(cli.root_folder.clone());
    let root_folder = resolver.resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = castlink_common::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let mut config = castlink_pr::config::load(&initializer.pipeline_config_path())?;

    match cli.command {
        Command::Resolve { budget_secs, limit } => {
            if let Some(budget) = budget_secs {
                config.job_budget_secs = budget;
            }
            if let Some(limit) = limit {
                config.batch_limit = limit;
            }
            run_resolve(pool, config).await?;
        }
        Command::Cleanup => {
            let engine = CleanupEngine::new(pool, NameValidator::new(config.validator));
            engine.run().await?;
        }
        Command::Ingest { file } => {
            let ingest = CrawlerIngest::new(pool, NameValidator::new(config.validator));
            ingest.ingest_file(&file).await?;
        }
    }

    Ok(())
}

async fn run_resolve(pool: sqlx::SqlitePool, config: PipelineConfig) -> Result<()> {
    let client = WikiIndexClient::new(
        &config.sources,
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build index client: {e}"))?;

    let resolver = SourceResolver::new(pool.clone(), config.sources.clone(), Arc::new(client));
    let runner = ResolutionRunner::new(
        pool,
        resolver,
        NameValidator::new(config.validator.clone()),
        config.batch_limit,
        Duration::from_secs(config.job_budget_secs),
    );

    // Interrupt stops starting new products; every write is idempotent so
    // partial progress is safe
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current product");
            signal_token.cancel();
        }
    });

    runner.run(&cancel).await?;
    Ok(())
}
