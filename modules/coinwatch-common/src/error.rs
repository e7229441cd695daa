use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoinwatchError {
    #[error("Database error: {0}")]
    Database(String),

    /// A page failed to reach its expected state within the timeout bound.
    /// Retryable.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// The page reached its expected state but contained no matching project
    /// or no security-score section. Retryable with a different search term.
    #[error("No data: {0}")]
    NoData(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
