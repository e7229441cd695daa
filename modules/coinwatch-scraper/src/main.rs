use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chrome_client::ChromeClient;
use coinwatch_common::Config;
use coinwatch_scraper::extractor::{ExtractorConfig, SkynetExtractor};
use coinwatch_scraper::run_lock::RunLock;
use coinwatch_scraper::runner::{BatchRunner, RunnerConfig};
use coinwatch_store::{migrate::migrate, CoinStore};

/// Scrape Skynet security metrics for every tracked coin that is due.
#[derive(Parser, Debug)]
#[command(name = "coinwatch-scraper")]
struct Cli {
    /// Cap the number of coins processed this run.
    #[arg(long)]
    limit: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("coinwatch=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("Coinwatch scraper starting...");

    let config = Config::from_env();

    let Some(_lock) = RunLock::acquire(&config.lock_path)? else {
        bail!("Another scrape run is in progress (lock: {})", config.lock_path);
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;
    let store = CoinStore::new(pool);

    let chrome = Arc::new(ChromeClient::launch(config.chrome_headless).await?);
    let extractor = SkynetExtractor::new(
        Arc::clone(&chrome),
        ExtractorConfig {
            base_url: config.skynet_url.clone(),
            ..ExtractorConfig::default()
        },
    );

    let runner = BatchRunner::new(
        Arc::new(store),
        Arc::new(extractor),
        RunnerConfig::default(),
    );
    let summary = runner.run(cli.limit).await?;

    chrome.close().await?;

    info!(
        success = summary.success,
        failed = summary.failed,
        total = summary.total,
        "Scrape run complete"
    );
    println!(
        "Scraped {} of {} coins ({} failed)",
        summary.success, summary.total, summary.failed
    );

    Ok(())
}
