//! Bounded-concurrency execution of per-download work.
//!
//! Each item runs the same async `work` closure; failures are captured per
//! item and never abort the batch.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use catalog::{Download, Purpose};
use scene_common::{SceneError, SceneResult};

use crate::progress::ProgressReporter;

/// Result of one item in a phase.
#[derive(Debug)]
pub enum ItemOutcome<T> {
    Succeeded { id: String, value: T },
    Failed { id: String, error: SceneError },
    /// Shutdown was requested before the item started
    Cancelled { id: String },
}

impl<T> ItemOutcome<T> {
    pub fn id(&self) -> &str {
        match self {
            ItemOutcome::Succeeded { id, .. }
            | ItemOutcome::Failed { id, .. }
            | ItemOutcome::Cancelled { id } => id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Succeeded { .. } => "succeeded",
            ItemOutcome::Failed { .. } => "failed",
            ItemOutcome::Cancelled { .. } => "cancelled",
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ItemOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Counts per outcome kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl OutcomeCounts {
    pub fn tally<T>(outcomes: &[ItemOutcome<T>]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Succeeded { .. } => counts.succeeded += 1,
                ItemOutcome::Failed { .. } => counts.failed += 1,
                ItemOutcome::Cancelled { .. } => counts.cancelled += 1,
            }
        }
        counts
    }
}

/// Runs one phase of downloads over a bounded pool.
pub struct DownloadOrchestrator {
    concurrency: usize,
    report_every: usize,
    shutdown: watch::Receiver<bool>,
}

impl DownloadOrchestrator {
    pub fn new(concurrency: usize, report_every: usize, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            report_every,
            shutdown,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run `work` for every item with a URL for `purpose`.
    ///
    /// Outcomes come back in input order, one per item.
    pub async fn fetch_all<T, F, Fut>(
        &self,
        items: &[Download],
        purpose: Purpose,
        work: F,
    ) -> Vec<ItemOutcome<T>>
    where
        F: Fn(Download, String) -> Fut,
        Fut: Future<Output = SceneResult<T>>,
    {
        let reporter = Arc::new(ProgressReporter::logging(
            purpose.as_str(),
            items.len(),
            self.report_every,
        ));
        self.fetch_all_with(items, purpose, reporter, work).await
    }

    /// Like [`fetch_all`](Self::fetch_all) with a caller-supplied reporter.
    pub async fn fetch_all_with<T, F, Fut>(
        &self,
        items: &[Download],
        purpose: Purpose,
        reporter: Arc<ProgressReporter>,
        work: F,
    ) -> Vec<ItemOutcome<T>>
    where
        F: Fn(Download, String) -> Fut,
        Fut: Future<Output = SceneResult<T>>,
    {
        let work = &work;
        let mut results = stream::iter(items.iter().cloned().enumerate())
            .map(|(index, item)| {
                let shutdown = self.shutdown.clone();
                let reporter = reporter.clone();
                async move {
                    let id = item.id.clone();
                    let outcome = if *shutdown.borrow() {
                        ItemOutcome::Cancelled { id }
                    } else {
                        let url = item.url(purpose).map(str::to_string);
                        let result = match url {
                            Some(url) => work(item, url).await,
                            None => Err(SceneError::download(
                                &id,
                                format!("no {} URL planned", purpose),
                            )),
                        };
                        match result {
                            Ok(value) => ItemOutcome::Succeeded { id, value },
                            Err(error) => {
                                warn!(
                                    item = %id,
                                    phase = %purpose,
                                    kind = error.kind(),
                                    error = %error,
                                    "Item failed"
                                );
                                ItemOutcome::Failed { id, error }
                            }
                        }
                    };

                    metrics::counter!(
                        "scene_items_total",
                        "phase" => purpose.as_str(),
                        "outcome" => outcome.label()
                    )
                    .increment(1);
                    reporter.item_done();
                    (index, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<_> = results.into_iter().map(|(_, outcome)| outcome).collect();

        let counts = OutcomeCounts::tally(&outcomes);
        info!(
            phase = %purpose,
            succeeded = counts.succeeded,
            failed = counts.failed,
            cancelled = counts.cancelled,
            "Phase complete"
        );

        outcomes
    }
}
