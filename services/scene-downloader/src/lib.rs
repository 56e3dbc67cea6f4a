//! Scene downloader: discovers scenes, assesses their fmask validity and
//! writes masked bands or a spectral index per surviving date.

pub mod config;
pub mod download;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;

pub use config::RunConfig;
pub use download::{DownloadConfig, DownloadManager};
pub use orchestrator::{DownloadOrchestrator, ItemOutcome, OutcomeCounts};
pub use pipeline::{ItemSummary, Pipeline, RunStatus, RunSummary, Validity, RUN_SUMMARY_FILE};
pub use progress::{Progress, ProgressCallback, ProgressReporter};
