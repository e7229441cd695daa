//! On-disk run reports: a JSON snapshot of what a scrape run produced,
//! for eyeballing results without querying the database.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use coinwatch_common::{AuditData, CoinRecord, ExtractionResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportEntry {
    coin_id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<i32>,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<AuditData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Accumulates per-coin outcomes and writes them out as one JSON document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    generated_at: DateTime<Utc>,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, coin: &CoinRecord, result: &ExtractionResult) {
        let (outcome, data, reason) = match result {
            ExtractionResult::Success(data) => ("success", Some(data.clone()), None),
            ExtractionResult::NoData { reason } => ("no_data", None, Some(reason.clone())),
            ExtractionResult::Failed { reason } => ("failed", None, Some(reason.clone())),
        };
        self.entries.push(ReportEntry {
            coin_id: coin.id.clone(),
            name: coin.name.clone(),
            symbol: coin.symbol.clone(),
            market_cap_rank: coin.market_cap_rank,
            outcome,
            data,
            reason,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serializing run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run report to {}", path.display()))?;
        info!(path = %path.display(), entries = self.entries.len(), "Run report saved");
        Ok(())
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
