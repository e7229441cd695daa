pub mod error;

pub use error::{ChromeClientError, Result};

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Flags for running Chromium inside containers and against sites that
/// fingerprint automated browsers.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-web-security",
    "--disable-blink-features=AutomationControlled",
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0 Safari/537.36";

/// How often page-readiness waits re-check for their selector.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One shared Chromium instance. Pages are cheap; the browser is not —
/// launch once per process and hand out pages per workflow.
pub struct ChromeClient {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeClient {
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1366, 768)
            .args(LAUNCH_ARGS.iter().copied());
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ChromeClientError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ChromeClientError::Launch(e.to_string()))?;

        // The handler drives the CDP websocket; it must be polled for the
        // browser to make progress.
        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });

        info!(headless, "Browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler: handle,
        })
    }

    /// Open a fresh page with a realistic user agent.
    pub async fn new_page(&self) -> Result<ChromePage> {
        let page = self.browser.lock().await.new_page("about:blank").await?;
        page.set_user_agent(USER_AGENT).await?;
        Ok(ChromePage { page })
    }

    pub async fn close(&self) -> Result<()> {
        if let Err(e) = self.browser.lock().await.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

/// A single controllable page. One owner at a time; close it when done.
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    /// Navigate and wait for the load to settle.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// Poll until `selector` is present or `timeout` elapses.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(ChromeClientError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Click into `selector` and type `text`.
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    /// Number of elements currently matching `selector`.
    pub async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self
            .page
            .find_elements(selector)
            .await
            .map(|els| els.len())
            .unwrap_or(0))
    }

    /// Trimmed inner text of the first element matching `selector`,
    /// or None when absent or empty.
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        match self.page.find_element(selector).await {
            Ok(el) => Ok(el
                .inner_text()
                .await?
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())),
            Err(_) => Ok(None),
        }
    }

    /// For each element matching `container`, read the trimmed inner text of
    /// the `label` child and of the first `value` child selector that yields
    /// text. Missing children yield None.
    pub async fn label_value_pairs(
        &self,
        container: &str,
        label: &str,
        values: &[&str],
    ) -> Result<Vec<(Option<String>, Option<String>)>> {
        let elements = self.page.find_elements(container).await.unwrap_or_default();
        let mut pairs = Vec::with_capacity(elements.len());
        for element in elements {
            let label_text = child_text(&element, label).await;
            let mut value_text = None;
            for value_selector in values {
                value_text = child_text(&element, value_selector).await;
                if value_text.is_some() {
                    break;
                }
            }
            pairs.push((label_text, value_text));
        }
        Ok(pairs)
    }

    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}

async fn child_text(element: &chromiumoxide::Element, selector: &str) -> Option<String> {
    let child = element.find_element(selector).await.ok()?;
    child
        .inner_text()
        .await
        .ok()
        .flatten()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
