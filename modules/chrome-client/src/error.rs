use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChromeClientError>;

#[derive(Debug, Error)]
pub enum ChromeClientError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Timed out after {timeout_secs}s waiting for selector: {selector}")]
    WaitTimeout { selector: String, timeout_secs: u64 },
}

impl From<chromiumoxide::error::CdpError> for ChromeClientError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ChromeClientError::Page(err.to_string())
    }
}
