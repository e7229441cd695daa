//! Scrape the current top five coins by market cap and write the results to
//! a JSON report, without touching the database. Useful as a smoke check of
//! the extraction flow against the live site.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chrome_client::ChromeClient;
use coinwatch_common::Config;
use coinwatch_discovery::MarketsClient;
use coinwatch_scraper::extractor::{ExtractorConfig, SkynetExtractor};
use coinwatch_scraper::report::RunReport;
use coinwatch_scraper::traits::MetricsExtractor;

const REPORT_PATH: &str = "top5_skynet_data.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("coinwatch=info".parse()?))
        .init();

    let config = Config::from_env();

    let coins = MarketsClient::new().top_n(5).await?;
    info!(coins = coins.len(), "Fetched top coins");

    let chrome = Arc::new(ChromeClient::launch(config.chrome_headless).await?);
    let extractor = SkynetExtractor::new(
        Arc::clone(&chrome),
        ExtractorConfig {
            base_url: config.skynet_url.clone(),
            ..ExtractorConfig::default()
        },
    );

    let mut report = RunReport::new();
    for coin in &coins {
        info!(coin = %coin.id, "Scraping");
        let result = extractor.extract(&coin.name).await;
        report.record(coin, &result);
    }

    chrome.close().await?;

    report.save_to_file(REPORT_PATH)?;
    println!("Wrote {} entries to {REPORT_PATH}", report.len());

    Ok(())
}
