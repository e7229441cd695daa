//! Attempt planning: every search alias for a coin is tried up to
//! `max_retries` times before the coin is given up on.

use coinwatch_common::CoinRecord;

/// Attempts per search term before moving to the next alias.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One scheduled extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAttempt {
    pub term: String,
    /// 1-based attempt number within this term.
    pub attempt: u32,
}

/// The full attempt schedule for a coin: aliases in priority order, each
/// retried `max_retries` times before the next alias is tried.
pub fn plan_attempts(coin: &CoinRecord, max_retries: u32) -> Vec<PlannedAttempt> {
    let mut plan = Vec::new();
    for term in coin.search_terms() {
        for attempt in 1..=max_retries {
            plan.push(PlannedAttempt {
                term: term.clone(),
                attempt,
            });
        }
    }
    plan
}
