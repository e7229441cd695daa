//! Skynet scrape engine.
//!
//! Candidates come from the store, get scheduled into attempt plans
//! (every search alias, retried), and run through the batch runner:
//! batches in sequence, coins within a batch concurrently. Extraction
//! itself drives a browser page through the Skynet search flow.
//!
//! The seams (`PageSource`, `StateStore`, `MetricsExtractor`) are traits
//! so the runner and extractor test against scripted fakes.

pub mod extractor;
pub mod report;
pub mod retry;
pub mod run_lock;
pub mod runner;
pub mod traits;

pub use extractor::{ExtractorConfig, SkynetExtractor};
pub use run_lock::RunLock;
pub use runner::{BatchRunner, RunnerConfig};
pub use traits::{MetricsExtractor, PageSource, ProjectPage, StateStore};
