use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use movie_ingest::api::{ApiServer, AppState};
use movie_ingest::database_ops::db::Db;
use movie_ingest::telemetry::{init_tracing, DEFAULT_FILTER};
use movie_ingest::{Config, ResumptionEngine};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "movie-ingest", version, about = "Incremental movie catalog ingestion")]
struct Cli {
    /// Override CRAWL_PAGE_BUDGET for this invocation
    #[arg(long, global = true)]
    max_pages: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run one crawl invocation and print the run report as JSON
    Run,
    /// Print the persisted crawl progress
    Status,
    /// Forget crawl progress; the next run starts a fresh cycle at page 1
    Reset,
    /// Serve the GET-only HTTP trigger
    Serve,
}

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(max_pages) = cli.max_pages {
        anyhow::ensure!(max_pages >= 1, "--max-pages must be at least 1");
        config.budget.max_pages = max_pages;
    }

    let db = Db::connect(&config.database).await?;
    let engine = ResumptionEngine::from_config(&config, db.clone())?;

    match cli.command {
        Commands::Run => {
            let report = engine.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let state = engine.progress().read().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Reset => {
            engine.progress().clear().await?;
            info!("crawl progress cleared");
        }
        Commands::Serve => {
            let server = ApiServer::from_config(&config);
            server
                .run(AppState::new(Arc::new(engine), Some(db)))
                .await?;
        }
    }
    Ok(())
}
