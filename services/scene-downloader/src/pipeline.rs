//! Two-phase scene pipeline: search, assess masks, then fetch and process survivors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use catalog::{
    group_by_solar_day, plan_downloads, remove_overshoot, remove_slc_off, CatalogClient,
    CatalogConfig, CoverageRequestBuilder, Download, Feature, Purpose, QueryParameters,
    SearchSummary,
};
use raster::{
    assess_tile, compute_index, mask_invalid, GeoTiffStore, RasterStore, ValidityStats,
    ValidityThreshold, ValidityVerdict,
};
use scene_common::{SceneError, SceneResult};

use crate::config::RunConfig;
use crate::download::DownloadManager;
use crate::orchestrator::{DownloadOrchestrator, ItemOutcome, OutcomeCounts};

/// File written next to the rasters describing every item.
pub const RUN_SUMMARY_FILE: &str = "run-summary.json";

/// Validity recorded for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// Not assessed, or the mask could not be fetched or read
    Unknown,
    Valid,
    Invalid,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    NoFeatures,
    NoSurvivors,
    Completed { written: usize, failed: usize },
    /// Shutdown requested between phases
    Cancelled,
}

/// Per-download record in the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub date: NaiveDate,
    pub file_name: String,
    pub validity: Validity,
    pub stats: Option<ValidityStats>,
    /// Outcome label per phase that ran for this item
    pub mask: Option<&'static str>,
    pub full: Option<&'static str>,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl ItemSummary {
    fn pending(download: &Download) -> Self {
        Self {
            id: download.id.clone(),
            date: download.date,
            file_name: download.file_name.clone(),
            validity: Validity::Unknown,
            stats: None,
            mask: None,
            full: None,
            output: None,
            error: None,
        }
    }
}

/// Everything a run did, serialized to `run-summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub search: SearchSummary,
    pub features: usize,
    pub downloads: usize,
    pub survivors: usize,
    pub items: Vec<ItemSummary>,
}

impl RunSummary {
    fn new(status: RunStatus, search: SearchSummary, features: usize) -> Self {
        Self {
            status,
            search,
            features,
            downloads: 0,
            survivors: 0,
            items: Vec::new(),
        }
    }

    fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_some()).count()
    }

    /// Write the summary as pretty JSON into `dir`.
    pub async fn write(&self, dir: &Path) -> SceneResult<PathBuf> {
        let path = dir.join(RUN_SUMMARY_FILE);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| SceneError::Processing(format!("failed to serialize run summary: {}", e)))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Drives one configured run end to end.
pub struct Pipeline {
    config: RunConfig,
    catalog: CatalogClient,
    coverage: CoverageRequestBuilder,
    downloads: DownloadManager,
    store: Arc<dyn RasterStore>,
    orchestrator: DownloadOrchestrator,
}

impl Pipeline {
    pub fn new(config: RunConfig, shutdown: watch::Receiver<bool>) -> SceneResult<Self> {
        let catalog = CatalogClient::new(CatalogConfig {
            endpoint: config.search.stac_endpoint.clone(),
            ..CatalogConfig::default()
        })?;
        let downloads = DownloadManager::new(config.download_config())?;
        let orchestrator = DownloadOrchestrator::new(
            config.download.concurrency,
            config.download.report_every,
            shutdown,
        );

        Ok(Self {
            coverage: config.coverage_builder(),
            config,
            catalog,
            downloads,
            store: Arc::new(GeoTiffStore::new()),
            orchestrator,
        })
    }

    /// Replace the raster codec.
    pub fn with_store(mut self, store: Arc<dyn RasterStore>) -> Self {
        self.store = store;
        self
    }

    /// Search the catalog and apply the feature filters in order.
    #[instrument(skip_all)]
    pub async fn discover(
        &self,
        query: &QueryParameters,
    ) -> SceneResult<(Vec<Feature>, SearchSummary)> {
        let (features, summary) = self.catalog.search_with_summary(query).await?;
        let found = features.len();

        let features = remove_slc_off(features, self.config.search.include_slc_off);
        let features = match self.config.search.max_outside_pct {
            Some(pct) => remove_overshoot(features, &query.aoi, pct)?,
            None => features,
        };
        let features = group_by_solar_day(features);

        info!(found, kept = features.len(), "Filtered catalog features");
        Ok((features, summary))
    }

    /// Phase 1: fetch each mask coverage and judge it.
    pub async fn assess_masks(&self, downloads: &[Download]) -> Vec<ItemOutcome<ValidityVerdict>> {
        self.orchestrator
            .fetch_all(downloads, Purpose::Mask, |item, url| self.assess_mask(item, url))
            .await
    }

    /// Phase 2: fetch each full coverage, process it and write the output.
    pub async fn process_survivors(&self, survivors: &[Download]) -> Vec<ItemOutcome<PathBuf>> {
        self.orchestrator
            .fetch_all(survivors, Purpose::Full, |item, url| self.process_full(item, url))
            .await
    }

    #[instrument(skip(self, item, url), fields(item = %item.id))]
    async fn assess_mask(&self, item: Download, url: String) -> SceneResult<ValidityVerdict> {
        let bytes = self.downloads.fetch(&item.id, Purpose::Mask, &url).await?;

        let store = self.store.clone();
        let assets = item.expected_assets(Purpose::Mask);
        let classes = self.config.processing.valid_classes;
        let threshold = ValidityThreshold::from_cloud_cover(self.config.processing.cloud_cover);

        let verdict = blocking(move || {
            let mut tile = store.decode(&bytes)?;
            tile.label_bands(&assets);
            let stats = assess_tile(&tile, &classes)?;
            Ok(threshold.judge(stats))
        })
        .await?;

        info!(
            pct_valid = verdict.stats.pct_valid,
            pct_overlap = verdict.stats.pct_overlap,
            keep = verdict.keep,
            "Assessed scene validity"
        );
        Ok(verdict)
    }

    #[instrument(skip(self, item, url), fields(item = %item.id))]
    async fn process_full(&self, item: Download, url: String) -> SceneResult<PathBuf> {
        let bytes = self.downloads.fetch(&item.id, Purpose::Full, &url).await?;

        let store = self.store.clone();
        let assets = item.expected_assets(Purpose::Full);
        let path = self.config.output_dir.join(&item.file_name);
        let processing = self.config.processing.clone();
        let options = self.config.index_options();

        let written = blocking(move || {
            let mut tile = store.decode(&bytes)?;
            tile.label_bands(&assets);
            let output = match processing.index {
                Some(index) => compute_index(&tile, index, &options)?,
                None => mask_invalid(
                    &tile,
                    &processing.valid_classes,
                    processing.nodata,
                    processing.drop_mask,
                )?,
            };
            store.write(&output, &path)?;
            Ok(path)
        })
        .await?;

        info!(path = %written.display(), "Wrote scene");
        Ok(written)
    }

    /// Run search, both phases and the summary file.
    pub async fn run(&self) -> SceneResult<RunSummary> {
        let query = self.config.query_parameters()?;
        let (features, search) = self.discover(&query).await?;

        let mut summary = RunSummary::new(RunStatus::NoFeatures, search, features.len());
        if features.is_empty() {
            warn!("No features found for query");
            return self.finish(summary).await;
        }

        let downloads = plan_downloads(&features, &query, &self.coverage)?;
        summary.downloads = downloads.len();
        summary.items = downloads.iter().map(ItemSummary::pending).collect();

        if self.orchestrator.is_cancelled() {
            summary.status = RunStatus::Cancelled;
            return self.finish(summary).await;
        }

        let verdicts = self.assess_masks(&downloads).await;
        let mut survivors = Vec::new();
        for ((download, outcome), record) in downloads.iter().zip(verdicts).zip(&mut summary.items) {
            record.mask = Some(outcome.label());
            match outcome {
                ItemOutcome::Succeeded { value, .. } => {
                    record.stats = Some(value.stats);
                    record.validity = if value.keep {
                        survivors.push(download.clone());
                        Validity::Valid
                    } else {
                        Validity::Invalid
                    };
                }
                ItemOutcome::Failed { error, .. } => record.error = Some(error.to_string()),
                ItemOutcome::Cancelled { .. } => {}
            }
        }
        summary.survivors = survivors.len();

        if survivors.is_empty() {
            summary.status = if self.orchestrator.is_cancelled() {
                RunStatus::Cancelled
            } else {
                RunStatus::NoSurvivors
            };
            return self.finish(summary).await;
        }
        if self.orchestrator.is_cancelled() {
            summary.status = RunStatus::Cancelled;
            return self.finish(summary).await;
        }

        let outputs = self.process_survivors(&survivors).await;
        let counts = OutcomeCounts::tally(&outputs);
        for outcome in outputs {
            let Some(record) = summary.items.iter_mut().find(|r| r.id == outcome.id()) else {
                continue;
            };
            record.full = Some(outcome.label());
            match outcome {
                ItemOutcome::Succeeded { value, .. } => record.output = Some(value),
                ItemOutcome::Failed { error, .. } => record.error = Some(error.to_string()),
                ItemOutcome::Cancelled { .. } => {}
            }
        }

        summary.status = RunStatus::Completed {
            written: counts.succeeded,
            failed: summary.failed(),
        };
        self.finish(summary).await
    }

    async fn finish(&self, summary: RunSummary) -> SceneResult<RunSummary> {
        let path = summary.write(&self.config.output_dir).await?;
        info!(
            status = ?summary.status,
            features = summary.features,
            downloads = summary.downloads,
            survivors = summary.survivors,
            path = %path.display(),
            "Run complete"
        );
        Ok(summary)
    }
}

/// Run CPU-bound raster work off the async workers.
async fn blocking<T, F>(f: F) -> SceneResult<T>
where
    F: FnOnce() -> SceneResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SceneError::Processing(format!("raster worker failed: {}", e)))?
}
