//! Refresh the tracked-coin list from the CoinGecko markets API: upsert the
//! current top coins and null the rank of coins that dropped out.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinwatch_common::Config;
use coinwatch_discovery::MarketsClient;
use coinwatch_store::{migrate::migrate, CoinStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("coinwatch=info".parse()?))
        .init();

    info!("Coin sync starting...");

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;
    let store = CoinStore::new(pool);

    let coins = MarketsClient::new().top_coins().await?;
    info!(coins = coins.len(), "Fetched market list");

    let upserted = store.upsert_coins(&coins).await?;

    let ids: Vec<String> = coins.iter().map(|c| c.id.clone()).collect();
    let dropped = store.clear_dropped_ranks(&ids).await?;

    info!(upserted, dropped, "Coin sync complete");
    println!("Synced {upserted} coins ({dropped} dropped out of the top list)");

    Ok(())
}
