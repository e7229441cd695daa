pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::CoinwatchError;
pub use types::{
    AuditData, Candidate, CoinRecord, ExtractionResult, FinancialData, Metric, RunSummary,
    ScrapeState, SecurityScores,
};
