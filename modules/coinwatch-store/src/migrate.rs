use sqlx::PgPool;
use tracing::info;

use coinwatch_common::CoinwatchError;

/// Create the `coins` table and its indexes. Idempotent; run at startup.
pub async fn migrate(pool: &PgPool) -> Result<(), CoinwatchError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coins (
            id              TEXT         PRIMARY KEY,
            symbol          TEXT         NOT NULL,
            name            TEXT         NOT NULL,
            market_cap_rank INTEGER,
            audit_data      JSONB,
            last_updated_at TIMESTAMPTZ,
            next_update_at  TIMESTAMPTZ,
            scrape_attempts INTEGER      NOT NULL DEFAULT 0,
            last_error      TEXT,
            created_at      TIMESTAMPTZ  NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ  NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CoinwatchError::Database(e.to_string()))?;

    // Candidate query scans on due time and orders by rank.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_coins_next_update ON coins (next_update_at)")
        .execute(pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_coins_rank ON coins (market_cap_rank)")
        .execute(pool)
        .await
        .map_err(|e| CoinwatchError::Database(e.to_string()))?;

    info!("Database migration complete");
    Ok(())
}
