use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked coin, sourced from the CoinGecko markets API.
///
/// `id` is the stable CoinGecko identifier and the primary key in the store.
/// `market_cap_rank` is nulled when a coin falls out of the tracked top list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<i32>,
}

impl CoinRecord {
    /// Search terms tried against the Skynet search box, in priority order:
    /// display name, upper-cased ticker, dash-normalized CoinGecko id.
    pub fn search_terms(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.symbol.to_uppercase(),
            self.id.replace('-', " "),
        ]
    }
}

/// Persisted per-coin scrape bookkeeping.
///
/// `audit_data` and `last_error` are independently settable: a failed attempt
/// never erases previously stored data, and a success always clears the error.
#[derive(Debug, Clone, Default)]
pub struct ScrapeState {
    /// Last successful extraction, stored as the raw JSONB payload.
    pub audit_data: Option<serde_json::Value>,
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Refresh horizon. Null or in the past means the coin is due now.
    pub next_update_at: Option<DateTime<Utc>>,
    /// Monotonic attempt counter, never reset.
    pub scrape_attempts: i32,
    pub last_error: Option<String>,
}

/// A coin together with its scrape state, as returned by the candidate query.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub coin: CoinRecord,
    pub state: ScrapeState,
}

/// One label/value pair read off the project detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

/// Security-score section of the project detail page.
///
/// Presence of this section is the success criterion for an extraction: an
/// otherwise complete read with empty scores is classified as no-data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScores {
    pub average_score: Option<String>,
    #[serde(default)]
    pub additional_metrics: Vec<Metric>,
}

impl SecurityScores {
    pub fn is_empty(&self) -> bool {
        self.average_score.is_none() && self.additional_metrics.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub daily_inflows: Vec<Metric>,
}

/// Structured metrics extracted from one project detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditData {
    /// The search term that produced this record.
    pub project: String,
    pub security_scores: SecurityScores,
    #[serde(default)]
    pub community_engagement: Vec<Metric>,
    pub financial_data: FinancialData,
}

/// Classified outcome of a single extraction attempt.
#[derive(Debug, Clone)]
pub enum ExtractionResult {
    Success(AuditData),
    /// The page loaded but had no matching project or no security scores.
    NoData { reason: String },
    /// The page never reached the expected state (timeout, navigation fault).
    Failed { reason: String },
}

/// Aggregate counts for one scrape run. Returned to the caller, not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub success: u32,
    pub failed: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_in_priority_order() {
        let coin = CoinRecord {
            id: "bitcoin-cash".to_string(),
            symbol: "bch".to_string(),
            name: "Bitcoin Cash".to_string(),
            market_cap_rank: Some(20),
        };
        assert_eq!(
            coin.search_terms(),
            vec!["Bitcoin Cash", "BCH", "bitcoin cash"]
        );
    }

    #[test]
    fn empty_scores_detected() {
        let mut scores = SecurityScores::default();
        assert!(scores.is_empty());

        scores.additional_metrics.push(Metric {
            label: "Code Security".to_string(),
            value: "92.1".to_string(),
        });
        assert!(!scores.is_empty());

        let scores = SecurityScores {
            average_score: Some("88".to_string()),
            additional_metrics: Vec::new(),
        };
        assert!(!scores.is_empty());
    }

    #[test]
    fn audit_data_serializes_camel_case() {
        let data = AuditData {
            project: "Bitcoin".to_string(),
            security_scores: SecurityScores {
                average_score: Some("94".to_string()),
                additional_metrics: Vec::new(),
            },
            community_engagement: Vec::new(),
            financial_data: FinancialData::default(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("securityScores").is_some());
        assert_eq!(json["securityScores"]["averageScore"], "94");
        assert!(json.get("communityEngagement").is_some());
    }
}
