//! Batch orchestration: candidates are processed in fixed-size batches,
//! coins within a batch concurrently, batches strictly in sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use coinwatch_common::{Candidate, CoinwatchError, ExtractionResult, RunSummary};

use crate::retry::{plan_attempts, DEFAULT_MAX_RETRIES};
use crate::traits::{MetricsExtractor, StateStore};

/// Coins scraped concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub batch_size: usize,
    /// Attempts per search alias.
    pub max_retries: u32,
    /// Pause between attempts for the same coin.
    pub attempt_backoff: Duration,
    /// Pause between batches.
    pub batch_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_backoff: Duration::from_secs(5),
            batch_delay: Duration::from_secs(5),
        }
    }
}

/// Outcome of processing one coin through its full attempt schedule.
enum CoinOutcome {
    Scraped,
    Exhausted,
}

pub struct BatchRunner<S, E> {
    store: Arc<S>,
    extractor: Arc<E>,
    config: RunnerConfig,
}

impl<S, E> BatchRunner<S, E>
where
    S: StateStore + 'static,
    E: MetricsExtractor + 'static,
{
    pub fn new(store: Arc<S>, extractor: Arc<E>, config: RunnerConfig) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Scrape every due candidate, at most `limit` when given. Returns the
    /// run's aggregate counts; only the candidate query itself can fail.
    pub async fn run(&self, limit: Option<i64>) -> Result<RunSummary, CoinwatchError> {
        let candidates = self
            .store
            .list_candidates(limit)
            .await
            .map_err(|e| CoinwatchError::Database(e.to_string()))?;

        if candidates.is_empty() {
            info!("No coins due for scraping");
            return Ok(RunSummary::default());
        }

        let total = candidates.len() as u32;
        info!(total, batch_size = self.config.batch_size, "Starting scrape run");

        let batches: Vec<Vec<Candidate>> = candidates
            .chunks(self.config.batch_size.max(1))
            .map(|c| c.to_vec())
            .collect();
        let batch_count = batches.len();

        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };

        for (index, batch) in batches.into_iter().enumerate() {
            info!(batch = index + 1, of = batch_count, coins = batch.len(), "Processing batch");

            let mut tasks = JoinSet::new();
            for candidate in batch {
                let store = Arc::clone(&self.store);
                let extractor = Arc::clone(&self.extractor);
                let config = self.config.clone();
                tasks.spawn(async move {
                    process_coin(store, extractor, config, candidate).await
                });
            }

            // A panicking coin task surfaces as a JoinError and counts as a
            // failure; the rest of the batch is unaffected.
            while let Some(joined) = tasks.join_next().await {
                summary = match joined {
                    Ok(CoinOutcome::Scraped) => RunSummary {
                        success: summary.success + 1,
                        ..summary
                    },
                    Ok(CoinOutcome::Exhausted) => RunSummary {
                        failed: summary.failed + 1,
                        ..summary
                    },
                    Err(e) => {
                        error!(error = %e, "Coin task aborted");
                        RunSummary {
                            failed: summary.failed + 1,
                            ..summary
                        }
                    }
                };
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        info!(
            success = summary.success,
            failed = summary.failed,
            total = summary.total,
            "Scrape run finished"
        );
        Ok(summary)
    }
}

/// Run one coin through its attempt schedule: each search alias in priority
/// order, each retried up to the configured count, stopping at first success.
async fn process_coin<S, E>(
    store: Arc<S>,
    extractor: Arc<E>,
    config: RunnerConfig,
    candidate: Candidate,
) -> CoinOutcome
where
    S: StateStore,
    E: MetricsExtractor,
{
    let coin = &candidate.coin;
    let plan = plan_attempts(coin, config.max_retries);
    let attempts = plan.len();

    for (i, planned) in plan.iter().enumerate() {
        info!(
            coin = %coin.id,
            term = %planned.term,
            attempt = planned.attempt,
            "Scraping"
        );

        // The counter is bookkeeping; a failed bump never blocks the attempt.
        if let Err(e) = store.increment_attempts(&coin.id).await {
            warn!(coin = %coin.id, error = %e, "Attempt counter update failed");
        }

        match extractor.extract(&planned.term).await {
            ExtractionResult::Success(data) => match store.record_success(&coin.id, &data).await {
                Ok(()) => {
                    info!(coin = %coin.id, term = %planned.term, "Scrape succeeded");
                    return CoinOutcome::Scraped;
                }
                Err(e) => {
                    // Data that cannot be persisted is a failed attempt.
                    error!(coin = %coin.id, error = %e, "Persisting scrape result failed");
                    record_error(store.as_ref(), &coin.id, &format!("Scraping failed: {e}")).await;
                }
            },
            ExtractionResult::NoData { reason } => {
                warn!(coin = %coin.id, term = %planned.term, %reason, "No data");
                record_error(store.as_ref(), &coin.id, &reason).await;
            }
            ExtractionResult::Failed { reason } => {
                warn!(coin = %coin.id, term = %planned.term, %reason, "Attempt failed");
                record_error(store.as_ref(), &coin.id, &format!("Scraping failed: {reason}")).await;
            }
        }

        if i + 1 < attempts {
            tokio::time::sleep(config.attempt_backoff).await;
        }
    }

    error!(coin = %coin.id, attempts, "All scraping attempts failed");
    record_error(
        store.as_ref(),
        &coin.id,
        &format!("All scraping attempts failed ({attempts} attempts)"),
    )
    .await;
    CoinOutcome::Exhausted
}

async fn record_error<S: StateStore + ?Sized>(store: &S, coin_id: &str, message: &str) {
    if let Err(e) = store.record_error(coin_id, message).await {
        warn!(coin = %coin_id, error = %e, "Recording scrape error failed");
    }
}
