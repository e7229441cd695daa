//! Skynet project-page extraction: search for a term, open the first
//! matching project, and read its security, community, and financial
//! metrics off the detail page.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use coinwatch_common::{AuditData, CoinwatchError, ExtractionResult, Metric, SecurityScores};

use crate::traits::{MetricsExtractor, PageSource, ProjectPage};

// Selectors for the Skynet search flow and project detail page. These are
// tied to the current markup and break when the site redesigns.
const SEARCH_INPUT: &str =
    r#"input[placeholder="Search by project, quest, exchange, wallet or token"]"#;
const RESULTS_LISTBOX: &str = r#"ul[role="listbox"]"#;
const RESULT_OPTION: &str = r#"ul[role="listbox"] .grid.border-b.border-n-10"#;
const FIRST_OPTION: &str = r#"ul[role="listbox"] .grid.border-b.border-n-10:first-of-type"#;

const AVERAGE_SCORE: &str = r#"span[class*="text-score-"]"#;
const SCORE_METRIC_BUTTON: &str =
    r#"button.flex.flex-col.transition.duration-200.w-\[100px\][type="button"]"#;
const SCORE_METRIC_LABEL: &str =
    "div.whitespace-nowrap.text-center.text-sm.font-normal.text-semantic-text-tertiary";
const SCORE_METRIC_VALUE: &str = "div.text-sm.font-medium";

const STAT_CARD: &str = "div.flex.h-full.flex-col.justify-between.text-neutral-100.dark\\:text-neutral-0.font-medium.gap-1.border-0";
const STAT_CARD_LABEL: &str = "div.w-full.truncate.whitespace-nowrap.text-semantic-text-quaternary.dark\\:text-semantic-text-quaternary.text-sm.font-normal";
const STAT_CARD_VALUE: &str = ".text-semantic-text-primary";

const INFLOW_ROW: &str = ".group.contents.cursor-pointer";
const INFLOW_LABEL: &str = ".text-xs.font-medium.sm\\:text-sm";
const INFLOW_POSITIVE: &str = ".text-component-tag-text-positive";
const INFLOW_NEGATIVE: &str = ".text-component-tag-text-negative";

/// Stat-card labels belonging to the community engagement section.
const COMMUNITY_LABELS: &[&str] = &[
    "Total Tweets (24h)",
    "Twitter Account Age",
    "Twitter Followers (24h)",
    "Twitter Activity Indicator",
];

/// Stat-card labels belonging to the financial section.
const FINANCIAL_LABELS: &[&str] = &[
    "Token Price",
    "Volume (24h)",
    "Market Cap",
    "Volume by Exchange Type (24h)",
    "Market Cap Held",
];

/// Timing knobs for the extraction flow. The settle delays exist because the
/// page keeps rendering after its selectors appear; tests shrink them to zero.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub base_url: String,
    /// Pause after typing, before the results listbox is awaited.
    pub search_settle: Duration,
    /// Pause after the listbox appears, while options populate.
    pub options_settle: Duration,
    /// Pause after clicking a result, while the detail page renders.
    pub detail_settle: Duration,
    pub search_timeout: Duration,
    pub listbox_timeout: Duration,
    pub option_timeout: Duration,
    pub score_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://skynet.certik.com/".to_string(),
            search_settle: Duration::from_secs(2),
            options_settle: Duration::from_secs(3),
            detail_settle: Duration::from_secs(30),
            search_timeout: Duration::from_secs(15),
            listbox_timeout: Duration::from_secs(30),
            option_timeout: Duration::from_secs(30),
            score_timeout: Duration::from_secs(30),
        }
    }
}

/// Extracts project metrics from Skynet, one fresh page per attempt.
pub struct SkynetExtractor<P: PageSource> {
    pages: P,
    config: ExtractorConfig,
}

impl<P: PageSource> SkynetExtractor<P> {
    pub fn new(pages: P, config: ExtractorConfig) -> Self {
        Self { pages, config }
    }

    /// Drive the page through search, selection, and metric reads. Navigation
    /// faults surface as errors; the caller classifies them.
    async fn extract_inner(
        &self,
        page: &dyn ProjectPage,
        term: &str,
    ) -> Result<AuditData, CoinwatchError> {
        page.goto(&self.config.base_url)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;

        page.wait_for_selector(SEARCH_INPUT, self.config.search_timeout)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;
        page.type_into(SEARCH_INPUT, term)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;

        tokio::time::sleep(self.config.search_settle).await;

        page.wait_for_selector(RESULTS_LISTBOX, self.config.listbox_timeout)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;

        // The listbox renders before its options do.
        tokio::time::sleep(self.config.options_settle).await;

        let options = page
            .count(RESULT_OPTION)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;
        if options == 0 {
            return Err(CoinwatchError::NoData(format!(
                "No dropdown options found for \"{term}\""
            )));
        }

        page.wait_for_selector(FIRST_OPTION, self.config.option_timeout)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;
        page.click(FIRST_OPTION)
            .await
            .map_err(|e| CoinwatchError::Navigation(e.to_string()))?;

        tokio::time::sleep(self.config.detail_settle).await;

        let mut data = AuditData {
            project: term.to_string(),
            ..AuditData::default()
        };

        // Metric reads degrade individually: a missing section is logged and
        // left empty rather than failing the attempt.
        data.security_scores = self.read_security_scores(page, term).await;
        self.read_stat_cards(page, term, &mut data).await;
        data.financial_data.daily_inflows = self.read_inflows(page, term).await;

        Ok(data)
    }

    async fn read_security_scores(&self, page: &dyn ProjectPage, term: &str) -> SecurityScores {
        let mut scores = SecurityScores::default();

        match page
            .wait_for_selector(AVERAGE_SCORE, self.config.score_timeout)
            .await
        {
            Ok(()) => match page.text_of(AVERAGE_SCORE).await {
                Ok(text) => scores.average_score = text,
                Err(e) => warn!(term, error = %e, "Average score read failed"),
            },
            Err(e) => warn!(term, error = %e, "Average score not found"),
        }

        match page
            .label_value_pairs(SCORE_METRIC_BUTTON, SCORE_METRIC_LABEL, &[SCORE_METRIC_VALUE])
            .await
        {
            Ok(pairs) => {
                scores.additional_metrics = pairs
                    .into_iter()
                    .filter_map(|(label, value)| {
                        Some(Metric {
                            label: label?,
                            value: value.unwrap_or_default(),
                        })
                    })
                    .collect();
            }
            Err(e) => warn!(term, error = %e, "Security metrics missing"),
        }

        scores
    }

    /// Stat cards mix community and financial metrics in one grid; they are
    /// partitioned by label allow-lists.
    async fn read_stat_cards(&self, page: &dyn ProjectPage, term: &str, data: &mut AuditData) {
        let pairs = match page
            .label_value_pairs(STAT_CARD, STAT_CARD_LABEL, &[STAT_CARD_VALUE])
            .await
        {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(term, error = %e, "Stat cards read failed");
                return;
            }
        };

        for (label, value) in pairs {
            let Some(label) = label else { continue };
            let metric = Metric {
                value: value.unwrap_or_default(),
                label,
            };
            if COMMUNITY_LABELS.contains(&metric.label.as_str()) {
                data.community_engagement.push(metric);
            } else if FINANCIAL_LABELS.contains(&metric.label.as_str()) {
                data.financial_data.metrics.push(metric);
            } else {
                debug!(term, label = %metric.label, "Unrecognized stat card label");
            }
        }
    }

    async fn read_inflows(&self, page: &dyn ProjectPage, term: &str) -> Vec<Metric> {
        match page
            .label_value_pairs(INFLOW_ROW, INFLOW_LABEL, &[INFLOW_POSITIVE, INFLOW_NEGATIVE])
            .await
        {
            Ok(pairs) => pairs
                .into_iter()
                .filter_map(|(label, value)| {
                    Some(Metric {
                        label: label?,
                        // Inflow rows with neither tag are flat days.
                        value: value.unwrap_or_else(|| "+0".to_string()),
                    })
                })
                .collect(),
            Err(e) => {
                warn!(term, error = %e, "Inflows fetch error");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<P: PageSource> MetricsExtractor for SkynetExtractor<P> {
    async fn extract(&self, term: &str) -> ExtractionResult {
        let page = match self.pages.open_page().await {
            Ok(page) => page,
            Err(e) => {
                return ExtractionResult::Failed {
                    reason: format!("Failed to open page: {e}"),
                }
            }
        };

        let outcome = self.extract_inner(page.as_ref(), term).await;

        if let Err(e) = page.close().await {
            warn!(term, error = %e, "Page did not close cleanly");
        }

        match outcome {
            Ok(data) if data.security_scores.is_empty() => ExtractionResult::NoData {
                reason: format!("No security data found for search term: {term}"),
            },
            Ok(data) => ExtractionResult::Success(data),
            Err(CoinwatchError::NoData(reason)) => ExtractionResult::NoData { reason },
            Err(e) => ExtractionResult::Failed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};

    /// A scripted page: selectors map to canned responses, and closing flips
    /// a shared flag so tests can assert the page is always released.
    #[derive(Default)]
    struct FakePage {
        /// Selectors that exist for wait/click purposes.
        present: Vec<&'static str>,
        counts: HashMap<&'static str, usize>,
        texts: HashMap<&'static str, &'static str>,
        pairs: HashMap<&'static str, Vec<(Option<String>, Option<String>)>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ProjectPage for FakePage {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
            if self.present.contains(&selector) {
                Ok(())
            } else {
                Err(anyhow!("timed out waiting for {selector}"))
            }
        }

        async fn type_into(&self, _selector: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<()> {
            Ok(())
        }

        async fn count(&self, selector: &str) -> Result<usize> {
            Ok(self.counts.get(selector).copied().unwrap_or(0))
        }

        async fn text_of(&self, selector: &str) -> Result<Option<String>> {
            Ok(self.texts.get(selector).map(|t| t.to_string()))
        }

        async fn label_value_pairs(
            &self,
            container: &str,
            _label: &str,
            _values: &[&str],
        ) -> Result<Vec<(Option<String>, Option<String>)>> {
            Ok(self.pairs.get(container).cloned().unwrap_or_default())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakePages {
        page: std::sync::Mutex<Option<FakePage>>,
    }

    #[async_trait]
    impl PageSource for FakePages {
        async fn open_page(&self) -> Result<Box<dyn ProjectPage>> {
            let page = self
                .page
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow!("no page scripted"))?;
            Ok(Box::new(page))
        }
    }

    fn instant_config() -> ExtractorConfig {
        ExtractorConfig {
            search_settle: Duration::ZERO,
            options_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            ..ExtractorConfig::default()
        }
    }

    fn extractor_with(page: FakePage) -> SkynetExtractor<FakePages> {
        SkynetExtractor::new(
            FakePages {
                page: std::sync::Mutex::new(Some(page)),
            },
            instant_config(),
        )
    }

    fn pair(label: &str, value: &str) -> (Option<String>, Option<String>) {
        (Some(label.to_string()), Some(value.to_string()))
    }

    fn happy_page(closed: Arc<AtomicBool>) -> FakePage {
        FakePage {
            present: vec![SEARCH_INPUT, RESULTS_LISTBOX, FIRST_OPTION, AVERAGE_SCORE],
            counts: HashMap::from([(RESULT_OPTION, 3)]),
            texts: HashMap::from([(AVERAGE_SCORE, "94.2")]),
            pairs: HashMap::from([
                (
                    SCORE_METRIC_BUTTON,
                    vec![pair("Code Security", "92.1"), pair("Fundamental Health", "88.0")],
                ),
                (
                    STAT_CARD,
                    vec![
                        pair("Twitter Followers (24h)", "1.2M"),
                        pair("Token Price", "$61,240"),
                        pair("Something Else", "ignored"),
                    ],
                ),
                (
                    INFLOW_ROW,
                    vec![
                        pair("Binance", "+$1.4M"),
                        (Some("Kraken".to_string()), None),
                    ],
                ),
            ]),
            closed,
        }
    }

    #[tokio::test]
    async fn full_page_extracts_and_partitions_metrics() {
        let closed = Arc::new(AtomicBool::new(false));
        let extractor = extractor_with(happy_page(closed.clone()));

        let result = extractor.extract("Bitcoin").await;
        let ExtractionResult::Success(data) = result else {
            panic!("expected success");
        };

        assert_eq!(data.project, "Bitcoin");
        assert_eq!(data.security_scores.average_score.as_deref(), Some("94.2"));
        assert_eq!(data.security_scores.additional_metrics.len(), 2);
        assert_eq!(data.community_engagement.len(), 1);
        assert_eq!(data.community_engagement[0].label, "Twitter Followers (24h)");
        assert_eq!(data.financial_data.metrics.len(), 1);
        assert_eq!(data.financial_data.metrics[0].label, "Token Price");
        // A row with neither inflow tag falls back to +0.
        assert_eq!(data.financial_data.daily_inflows[1].value, "+0");
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_security_scores_classify_as_no_data() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut page = happy_page(closed.clone());
        page.present.retain(|s| *s != AVERAGE_SCORE);
        page.texts.remove(AVERAGE_SCORE);
        page.pairs.remove(SCORE_METRIC_BUTTON);

        let extractor = extractor_with(page);
        let result = extractor.extract("Obscurecoin").await;

        let ExtractionResult::NoData { reason } = result else {
            panic!("expected no-data");
        };
        assert_eq!(
            reason,
            "No security data found for search term: Obscurecoin"
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn zero_dropdown_options_classify_as_no_data() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut page = happy_page(closed.clone());
        page.counts.insert(RESULT_OPTION, 0);

        let extractor = extractor_with(page);
        let result = extractor.extract("XYZ").await;

        let ExtractionResult::NoData { reason } = result else {
            panic!("expected no-data");
        };
        assert_eq!(reason, "No dropdown options found for \"XYZ\"");
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn search_timeout_fails_and_still_closes_page() {
        let closed = Arc::new(AtomicBool::new(false));
        let page = FakePage {
            closed: closed.clone(),
            ..FakePage::default()
        };

        let extractor = extractor_with(page);
        let result = extractor.extract("Bitcoin").await;

        assert!(matches!(result, ExtractionResult::Failed { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unopenable_page_is_a_failure() {
        let extractor = SkynetExtractor::new(
            FakePages {
                page: std::sync::Mutex::new(None),
            },
            instant_config(),
        );
        let result = extractor.extract("Bitcoin").await;
        assert!(matches!(result, ExtractionResult::Failed { .. }));
    }
}
