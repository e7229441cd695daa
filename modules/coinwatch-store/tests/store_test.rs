//! Integration tests for CoinStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;

use coinwatch_common::{AuditData, CoinRecord, Metric, SecurityScores};
use coinwatch_store::{migrate, CoinStore};

// Tests share one table; serialize them so truncation cannot race.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn test_store() -> Option<(CoinStore, PgPool)> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    migrate(&pool).await.ok()?;
    sqlx::query("TRUNCATE coins").execute(&pool).await.ok()?;

    Some((CoinStore::new(pool.clone()), pool))
}

fn coin(id: &str, rank: Option<i32>) -> CoinRecord {
    CoinRecord {
        id: id.to_string(),
        symbol: id.chars().take(3).collect(),
        name: id.to_string(),
        market_cap_rank: rank,
    }
}

fn audit_data(term: &str) -> AuditData {
    AuditData {
        project: term.to_string(),
        security_scores: SecurityScores {
            average_score: Some("91".to_string()),
            additional_metrics: vec![Metric {
                label: "Code Security".to_string(),
                value: "93.4".to_string(),
            }],
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn candidates_filter_by_data_and_horizon() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, pool)) = test_store().await else {
        return;
    };

    store
        .upsert_coins(&[coin("never-scraped", Some(2)), coin("fresh", Some(1)), coin("expired", Some(3))])
        .await
        .unwrap();

    // "fresh" has data and a future horizon; "expired" is past its horizon.
    store.record_success("fresh", &audit_data("fresh")).await.unwrap();
    store.record_success("expired", &audit_data("expired")).await.unwrap();
    sqlx::query("UPDATE coins SET next_update_at = now() - interval '1 hour' WHERE id = 'expired'")
        .execute(&pool)
        .await
        .unwrap();

    let candidates = store.list_candidates(None).await.unwrap();
    let ids: Vec<&str> = candidates.iter().map(|c| c.coin.id.as_str()).collect();
    assert_eq!(ids, vec!["never-scraped", "expired"]);
}

#[tokio::test]
async fn candidates_ordered_by_rank_with_limit() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, _pool)) = test_store().await else {
        return;
    };

    store
        .upsert_coins(&[
            coin("third", Some(30)),
            coin("first", Some(1)),
            coin("unranked", None),
            coin("second", Some(2)),
        ])
        .await
        .unwrap();

    let all = store.list_candidates(None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|c| c.coin.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third", "unranked"]);

    let limited = store.list_candidates(Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].coin.id, "first");

    // Zero and negative limits mean unbounded.
    let unbounded = store.list_candidates(Some(0)).await.unwrap();
    assert_eq!(unbounded.len(), 4);
}

#[tokio::test]
async fn success_clears_error_and_advances_horizon() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, pool)) = test_store().await else {
        return;
    };

    store.upsert_coins(&[coin("bitcoin", Some(1))]).await.unwrap();
    store.record_error("bitcoin", "previous failure").await.unwrap();

    let before = Utc::now();
    store.record_success("bitcoin", &audit_data("Bitcoin")).await.unwrap();

    let due = store.list_candidates(None).await.unwrap();
    assert!(due.is_empty(), "freshly scraped coin should not be due");

    let state = fetch_state(&pool, "bitcoin").await;
    assert!(state.last_error.is_none());
    assert!(state.audit_data.is_some());
    let next = state.next_update_at.expect("horizon set");
    let expected = before + Duration::hours(48);
    assert!((next - expected).num_seconds().abs() < 60, "horizon ~48h out, got {next}");
}

#[tokio::test]
async fn error_preserves_existing_data() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, pool)) = test_store().await else {
        return;
    };

    store.upsert_coins(&[coin("cardano", Some(8))]).await.unwrap();
    store.record_success("cardano", &audit_data("Cardano")).await.unwrap();

    let before = fetch_state(&pool, "cardano").await;
    store.record_error("cardano", "Scraping failed: timed out").await.unwrap();

    let after = fetch_state(&pool, "cardano").await;
    assert_eq!(after.audit_data, before.audit_data);
    assert_eq!(after.next_update_at, before.next_update_at);
    assert_eq!(after.last_error.as_deref(), Some("Scraping failed: timed out"));
}

#[tokio::test]
async fn attempt_counter_increments_per_call() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, pool)) = test_store().await else {
        return;
    };

    store.upsert_coins(&[coin("solana", Some(5))]).await.unwrap();
    for _ in 0..3 {
        store.increment_attempts("solana").await.unwrap();
    }

    let state = fetch_state(&pool, "solana").await;
    assert_eq!(state.scrape_attempts, 3);
}

#[tokio::test]
async fn upsert_refreshes_rank_and_dropped_coins_keep_state() {
    let _guard = DB_LOCK.lock().await;
    let Some((store, pool)) = test_store().await else {
        return;
    };

    store
        .upsert_coins(&[coin("ether", Some(2)), coin("dropped-coin", Some(900))])
        .await
        .unwrap();
    store.record_success("dropped-coin", &audit_data("Dropped")).await.unwrap();

    // Next sync: "ether" climbed, "dropped-coin" fell out of the top list.
    store.upsert_coins(&[coin("ether", Some(1))]).await.unwrap();
    store.clear_dropped_ranks(&["ether".to_string()]).await.unwrap();

    let candidates = store.list_candidates(None).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].coin.id, "ether");
    assert_eq!(candidates[0].coin.market_cap_rank, Some(1));

    // Dropped coin is unranked but its data survives.
    let state = fetch_state(&pool, "dropped-coin").await;
    assert!(state.audit_data.is_some());
}

async fn fetch_state(pool: &PgPool, id: &str) -> coinwatch_common::ScrapeState {
    let row = sqlx::query(
        "SELECT audit_data, last_updated_at, next_update_at, scrape_attempts, last_error \
         FROM coins WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap();
    coinwatch_common::ScrapeState {
        audit_data: row.try_get("audit_data").unwrap(),
        last_updated_at: row.try_get("last_updated_at").unwrap(),
        next_update_at: row.try_get("next_update_at").unwrap(),
        scrape_attempts: row.try_get("scrape_attempts").unwrap(),
        last_error: row.try_get("last_error").unwrap(),
    }
}
