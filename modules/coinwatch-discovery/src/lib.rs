//! CoinGecko markets API client — discovers the coin population to track.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use coinwatch_common::{CoinRecord, CoinwatchError};

const API_BASE: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko caps market pages at 250 rows.
const PER_PAGE: u32 = 250;
/// 4 pages of 250 = the top 1000 coins by market cap.
const PAGES: u32 = 4;
/// Free-tier rate limit is ~50 calls/min; pace page fetches accordingly.
const PAGE_PACING: Duration = Duration::from_millis(1200);

#[derive(Debug, Deserialize)]
struct MarketCoin {
    id: String,
    symbol: String,
    name: String,
    market_cap_rank: Option<i32>,
}

impl From<MarketCoin> for CoinRecord {
    fn from(coin: MarketCoin) -> Self {
        CoinRecord {
            id: coin.id,
            symbol: coin.symbol,
            name: coin.name,
            market_cap_rank: coin.market_cap_rank,
        }
    }
}

pub struct MarketsClient {
    client: reqwest::Client,
}

impl MarketsClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Fetch the top 1000 coins by market cap, paged and paced.
    /// A failed page stops pagination; earlier pages are still returned.
    pub async fn top_coins(&self) -> Result<Vec<CoinRecord>, CoinwatchError> {
        let mut coins = Vec::new();
        for page in 1..=PAGES {
            match self.fetch_page(page, PER_PAGE).await {
                Ok(batch) => {
                    info!(page, count = batch.len(), "Fetched market page");
                    coins.extend(batch);
                }
                Err(e) => {
                    warn!(page, error = %e, "Market page fetch failed, stopping pagination");
                    break;
                }
            }
            if page < PAGES {
                tokio::time::sleep(PAGE_PACING).await;
            }
        }
        if coins.is_empty() {
            return Err(CoinwatchError::Discovery(
                "No coins received from CoinGecko".to_string(),
            ));
        }
        Ok(coins)
    }

    /// Fetch the first `per_page` coins only. Used by test/debug runs.
    pub async fn top_n(&self, per_page: u32) -> Result<Vec<CoinRecord>, CoinwatchError> {
        self.fetch_page(1, per_page).await
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<CoinRecord>, CoinwatchError> {
        let url = format!(
            "{API_BASE}/coins/markets?vs_currency=usd&order=market_cap_desc\
             &per_page={per_page}&page={page}&sparkline=false"
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoinwatchError::Discovery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoinwatchError::Discovery(format!(
                "CoinGecko returned HTTP {status} for page {page}"
            )));
        }

        let coins: Vec<MarketCoin> = resp
            .json()
            .await
            .map_err(|e| CoinwatchError::Discovery(format!("Bad markets payload: {e}")))?;

        Ok(coins.into_iter().map(CoinRecord::from).collect())
    }
}

impl Default for MarketsClient {
    fn default() -> Self {
        Self::new()
    }
}
