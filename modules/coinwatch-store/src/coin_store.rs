//! Postgres store for coins and their scrape state.

use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use coinwatch_common::{AuditData, Candidate, CoinRecord, CoinwatchError, ScrapeState};

/// Hours until a successfully scraped coin becomes due again.
const REFRESH_HOURS: i64 = 48;

#[derive(Clone)]
pub struct CoinStore {
    pool: PgPool,
}

impl CoinStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Coins that need scraping: never scraped, or past their refresh horizon.
    /// Ordered by market cap rank ascending (unranked coins last).
    /// `limit` caps the result when positive; otherwise unbounded.
    pub async fn list_candidates(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<Candidate>, CoinwatchError> {
        const BASE: &str = r#"
            SELECT id, symbol, name, market_cap_rank,
                   audit_data, last_updated_at, next_update_at,
                   scrape_attempts, last_error
            FROM coins
            WHERE audit_data IS NULL OR next_update_at <= now()
            ORDER BY market_cap_rank ASC NULLS LAST
        "#;

        let rows = match limit {
            Some(n) if n > 0 => {
                sqlx::query(&format!("{BASE} LIMIT $1"))
                    .bind(n)
                    .fetch_all(&self.pool)
                    .await
            }
            _ => sqlx::query(BASE).fetch_all(&self.pool).await,
        }
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        rows.into_iter().map(candidate_from_row).collect()
    }

    /// Store a successful extraction: set the data, stamp the update time,
    /// push the refresh horizon out, and clear any previous error.
    pub async fn record_success(
        &self,
        coin_id: &str,
        data: &AuditData,
    ) -> Result<(), CoinwatchError> {
        let payload = serde_json::to_value(data)
            .map_err(|e| CoinwatchError::Database(format!("Audit data serialization: {e}")))?;
        let now = Utc::now();
        let next_update = now + Duration::hours(REFRESH_HOURS);

        sqlx::query(
            r#"
            UPDATE coins
            SET audit_data = $2,
                last_updated_at = $3,
                next_update_at = $4,
                last_error = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(coin_id)
        .bind(payload)
        .bind(now)
        .bind(next_update)
        .execute(&self.pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        Ok(())
    }

    /// Store a failed attempt. Leaves `audit_data` and `next_update_at`
    /// untouched so stale data survives a bad run.
    pub async fn record_error(&self, coin_id: &str, message: &str) -> Result<(), CoinwatchError> {
        sqlx::query(
            r#"
            UPDATE coins
            SET last_error = $2,
                last_updated_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(coin_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        Ok(())
    }

    /// Bump the attempt counter. Server-side increment, so concurrent
    /// workflows cannot lose updates.
    pub async fn increment_attempts(&self, coin_id: &str) -> Result<(), CoinwatchError> {
        sqlx::query(
            "UPDATE coins SET scrape_attempts = scrape_attempts + 1, updated_at = now() \
             WHERE id = $1",
        )
        .bind(coin_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        Ok(())
    }

    /// Upsert the discovered coin population. Scrape state columns are left
    /// alone; only identity and rank are refreshed.
    pub async fn upsert_coins(&self, coins: &[CoinRecord]) -> Result<u64, CoinwatchError> {
        let mut upserted = 0u64;
        for coin in coins {
            let result = sqlx::query(
                r#"
                INSERT INTO coins (id, symbol, name, market_cap_rank)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET symbol = EXCLUDED.symbol,
                    name = EXCLUDED.name,
                    market_cap_rank = EXCLUDED.market_cap_rank,
                    updated_at = now()
                "#,
            )
            .bind(&coin.id)
            .bind(&coin.symbol)
            .bind(&coin.name)
            .bind(coin.market_cap_rank)
            .execute(&self.pool)
            .await
            .map_err(|e| CoinwatchError::Database(e.to_string()))?;
            upserted += result.rows_affected();
        }
        info!(count = upserted, "Coins upserted");
        Ok(upserted)
    }

    /// Null the rank of coins no longer in the current top list. Nothing is
    /// deleted; dropped coins just stop sorting ahead of ranked ones.
    pub async fn clear_dropped_ranks(&self, current_ids: &[String]) -> Result<u64, CoinwatchError> {
        let result = sqlx::query(
            r#"
            UPDATE coins
            SET market_cap_rank = NULL, updated_at = now()
            WHERE NOT (id = ANY($1)) AND market_cap_rank IS NOT NULL
            "#,
        )
        .bind(current_ids)
        .execute(&self.pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        let dropped = result.rows_affected();
        if dropped > 0 {
            info!(count = dropped, "Ranks cleared for dropped coins");
        }
        Ok(dropped)
    }
}

fn candidate_from_row(row: PgRow) -> Result<Candidate, CoinwatchError> {
    let read = |e: sqlx::Error| CoinwatchError::Database(e.to_string());
    Ok(Candidate {
        coin: CoinRecord {
            id: row.try_get("id").map_err(read)?,
            symbol: row.try_get("symbol").map_err(read)?,
            name: row.try_get("name").map_err(read)?,
            market_cap_rank: row.try_get("market_cap_rank").map_err(read)?,
        },
        state: ScrapeState {
            audit_data: row.try_get("audit_data").map_err(read)?,
            last_updated_at: row.try_get("last_updated_at").map_err(read)?,
            next_update_at: row.try_get("next_update_at").map_err(read)?,
            scrape_attempts: row.try_get("scrape_attempts").map_err(read)?,
            last_error: row.try_get("last_error").map_err(read)?,
        },
    })
}
