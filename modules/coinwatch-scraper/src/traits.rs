// Trait abstractions for the scrape engine's dependencies.
//
// ProjectPage / PageSource — the browser seam: one controllable page with
//   navigate, wait-for-element, type, click, and extract-text primitives.
// StateStore — persisted per-coin scrape state.
// MetricsExtractor — the whole page-driving extraction, one term at a time.
//
// These enable deterministic testing with scripted fakes: no browser,
// no database. `cargo test` in seconds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use coinwatch_common::{AuditData, Candidate, ExtractionResult};

// ---------------------------------------------------------------------------
// ProjectPage — one controllable browser page
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProjectPage: Send + Sync {
    /// Navigate and wait for the load to settle.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until `selector` is present, up to `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Click into `selector` and type `text`.
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Trimmed text of the first match, None when absent.
    async fn text_of(&self, selector: &str) -> Result<Option<String>>;

    /// Bulk label/value read over every `container` match. Value selectors
    /// are tried in order; the first that yields text wins.
    async fn label_value_pairs(
        &self,
        container: &str,
        label: &str,
        values: &[&str],
    ) -> Result<Vec<(Option<String>, Option<String>)>>;

    /// Release the page. Must be called on every exit path.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
impl ProjectPage for chrome_client::ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        Ok(chrome_client::ChromePage::goto(self, url).await?)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        Ok(chrome_client::ChromePage::wait_for_selector(self, selector, timeout).await?)
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        Ok(chrome_client::ChromePage::type_into(self, selector, text).await?)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        Ok(chrome_client::ChromePage::click(self, selector).await?)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(chrome_client::ChromePage::count(self, selector).await?)
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        Ok(chrome_client::ChromePage::text_of(self, selector).await?)
    }

    async fn label_value_pairs(
        &self,
        container: &str,
        label: &str,
        values: &[&str],
    ) -> Result<Vec<(Option<String>, Option<String>)>> {
        Ok(chrome_client::ChromePage::label_value_pairs(self, container, label, values).await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(chrome_client::ChromePage::close(*self).await?)
    }
}

// ---------------------------------------------------------------------------
// PageSource — hands out fresh pages from the shared browser
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn ProjectPage>>;
}

#[async_trait]
impl PageSource for chrome_client::ChromeClient {
    async fn open_page(&self) -> Result<Box<dyn ProjectPage>> {
        Ok(Box::new(self.new_page().await?))
    }
}

/// Also implemented for `Arc<P>` so the browser can be shared with the
/// caller that eventually closes it.
#[async_trait]
impl<P: PageSource> PageSource for Arc<P> {
    async fn open_page(&self) -> Result<Box<dyn ProjectPage>> {
        self.as_ref().open_page().await
    }
}

// ---------------------------------------------------------------------------
// StateStore — persisted per-coin scrape state
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Coins due for scraping, ordered by rank. `limit` caps when positive.
    async fn list_candidates(&self, limit: Option<i64>) -> Result<Vec<Candidate>>;

    /// Persist a success: data set, horizon advanced, error cleared.
    async fn record_success(&self, coin_id: &str, data: &AuditData) -> Result<()>;

    /// Persist a failure message. Never touches stored data or the horizon.
    async fn record_error(&self, coin_id: &str, message: &str) -> Result<()>;

    /// Bump the monotonic attempt counter.
    async fn increment_attempts(&self, coin_id: &str) -> Result<()>;
}

#[async_trait]
impl StateStore for coinwatch_store::CoinStore {
    async fn list_candidates(&self, limit: Option<i64>) -> Result<Vec<Candidate>> {
        Ok(coinwatch_store::CoinStore::list_candidates(self, limit).await?)
    }

    async fn record_success(&self, coin_id: &str, data: &AuditData) -> Result<()> {
        Ok(coinwatch_store::CoinStore::record_success(self, coin_id, data).await?)
    }

    async fn record_error(&self, coin_id: &str, message: &str) -> Result<()> {
        Ok(coinwatch_store::CoinStore::record_error(self, coin_id, message).await?)
    }

    async fn increment_attempts(&self, coin_id: &str) -> Result<()> {
        Ok(coinwatch_store::CoinStore::increment_attempts(self, coin_id).await?)
    }
}

// ---------------------------------------------------------------------------
// MetricsExtractor — one full extraction attempt per call
// ---------------------------------------------------------------------------

/// Drives a page through search → select → read for a single search term.
/// Failures are classified into the result, never raised: the retry loop
/// treats every outcome as data.
#[async_trait]
pub trait MetricsExtractor: Send + Sync {
    async fn extract(&self, term: &str) -> ExtractionResult;
}
