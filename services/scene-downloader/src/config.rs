//! Run configuration loaded from YAML.
//!
//! Every section has defaults, so a minimal file only needs the area,
//! dates and either `assets` or `index`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use catalog::{
    with_mask, Collection, CoverageRequestBuilder, QueryParameters, DEFAULT_PAGE_LIMIT, DEFAULT_RESOLUTION,
    DEFAULT_STAC_ENDPOINT, DEFAULT_WCS_ENDPOINT,
};
use raster::geotiff::MAX_BANDS;
use raster::{IndexOptions, NonFinitePolicy, SpectralIndex};
use scene_common::{BoundingBox, CrsCode, DateRange, FmaskClass, SceneError, SceneResult, ValidClasses};

use crate::download::DownloadConfig;

/// Root configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub search: SearchConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Catalog search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_stac_endpoint")]
    pub stac_endpoint: String,
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Area of interest as [min_x, min_y, max_x, max_y]
    pub bbox: [f64; 4],
    /// CRS of `bbox`
    #[serde(default = "default_bbox_crs")]
    pub bbox_crs: CrsCode,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_slc_off: bool,
    /// Drop scenes with more than this share (percent) of their footprint
    /// outside the area of interest
    #[serde(default)]
    pub max_outside_pct: Option<f64>,
}

/// Coverage request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    #[serde(default = "default_wcs_endpoint")]
    pub wcs_endpoint: String,
    #[serde(default = "default_output_crs")]
    pub output_crs: CrsCode,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            wcs_endpoint: default_wcs_endpoint(),
            output_crs: default_output_crs(),
            resolution: default_resolution(),
        }
    }
}

/// Validity and band processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Raw bands to download; mutually exclusive with `index`
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub index: Option<SpectralIndex>,
    #[serde(default)]
    pub valid_classes: ValidClasses,
    /// Maximum cloud cover percentage a scene may have
    #[serde(default = "default_cloud_cover")]
    pub cloud_cover: f64,
    #[serde(default = "default_nodata")]
    pub nodata: f32,
    #[serde(default)]
    pub drop_mask: bool,
    #[serde(default)]
    pub keep_mask: bool,
    #[serde(default)]
    pub non_finite: NonFinitePolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            index: None,
            valid_classes: ValidClasses::default(),
            cloud_cover: default_cloud_cover(),
            nodata: default_nodata(),
            drop_mask: false,
            keep_mask: false,
            non_finite: NonFinitePolicy::default(),
        }
    }
}

/// Download behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_secs: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_report_every")]
    pub report_every: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: 0,
            initial_retry_delay_secs: default_initial_retry_delay(),
            max_retry_delay_secs: default_max_retry_delay(),
            timeout_secs: default_timeout(),
            report_every: default_report_every(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_stac_endpoint() -> String {
    DEFAULT_STAC_ENDPOINT.to_string()
}

fn default_wcs_endpoint() -> String {
    DEFAULT_WCS_ENDPOINT.to_string()
}

fn default_collections() -> Vec<String> {
    Collection::KNOWN.iter().map(|c| c.name.to_string()).collect()
}

fn default_bbox_crs() -> CrsCode {
    CrsCode::Epsg4326
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_output_crs() -> CrsCode {
    CrsCode::Epsg3577
}

fn default_resolution() -> f64 {
    DEFAULT_RESOLUTION
}

fn default_cloud_cover() -> f64 {
    10.0
}

fn default_nodata() -> f32 {
    -999.0
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_initial_retry_delay() -> u64 {
    2
}

fn default_max_retry_delay() -> u64 {
    120
}

fn default_timeout() -> u64 {
    1800
}

fn default_report_every() -> usize {
    5
}

impl RunConfig {
    /// Configuration with every optional setting at its default.
    pub fn new(start: NaiveDate, end: NaiveDate, bbox: [f64; 4]) -> Self {
        Self {
            search: SearchConfig {
                stac_endpoint: default_stac_endpoint(),
                collections: default_collections(),
                start,
                end,
                bbox,
                bbox_crs: default_bbox_crs(),
                limit: default_page_limit(),
                include_slc_off: false,
                max_outside_pct: None,
            },
            coverage: CoverageConfig::default(),
            processing: ProcessingConfig::default(),
            download: DownloadSettings::default(),
            output_dir: default_output_dir(),
        }
    }

    /// Load a run configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded run config");
        Ok(config)
    }

    /// Check the configuration before any network access.
    ///
    /// Unknown collection names only produce a warning.
    pub fn validate(&self) -> SceneResult<()> {
        let invalid = |msg: String| Err(SceneError::InvalidConfig(msg));

        if self.search.collections.is_empty() {
            return invalid("at least one collection is required".to_string());
        }
        for name in &self.search.collections {
            if Collection::lookup(name).is_none() {
                warn!(collection = %name, "Collection is not in the known list");
            }
        }

        self.date_range()?;
        self.aoi()?;

        match (self.processing.assets.is_empty(), self.processing.index) {
            (true, None) => return invalid("either assets or index must be set".to_string()),
            (false, Some(index)) => {
                return invalid(format!("assets and index ({}) are mutually exclusive", index))
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.processing.assets.iter().find(|a| !seen.insert(a.as_str())) {
            return invalid(format!("asset {} is listed more than once", dup));
        }
        let bands = with_mask(&self.requested_assets()).len();
        if bands > MAX_BANDS {
            return invalid(format!(
                "{} bands including the fmask exceed the GeoTIFF limit of {}",
                bands, MAX_BANDS
            ));
        }

        let max_class = FmaskClass::ALL.len() as u8;
        if self.processing.valid_classes.is_empty() {
            return invalid("valid_classes must not be empty".to_string());
        }
        if let Some(bad) = self
            .processing
            .valid_classes
            .values()
            .into_iter()
            .find(|v| *v >= max_class)
        {
            return invalid(format!("valid class {} is outside 0..={}", bad, max_class - 1));
        }

        let cloud = self.processing.cloud_cover;
        if !(0.0..=100.0).contains(&cloud) {
            return invalid(format!("cloud_cover {} is outside 0..=100", cloud));
        }
        if let Some(pct) = self.search.max_outside_pct {
            if !(0.0..=100.0).contains(&pct) {
                return invalid(format!("max_outside_pct {} is outside 0..=100", pct));
            }
        }
        if !(self.coverage.resolution.is_finite() && self.coverage.resolution > 0.0) {
            return invalid(format!("resolution {} must be positive", self.coverage.resolution));
        }
        if self.download.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if self.download.report_every == 0 {
            return invalid("report_every must be at least 1".to_string());
        }

        self.check_output_dir()
    }

    fn check_output_dir(&self) -> SceneResult<()> {
        let dir = &self.output_dir;
        if !dir.is_dir() {
            return Err(SceneError::InvalidConfig(format!(
                "output directory {} does not exist",
                dir.display()
            )));
        }

        let probe = dir.join(".write-probe");
        fs::write(&probe, b"").map_err(|e| {
            SceneError::InvalidConfig(format!(
                "output directory {} is not writable: {}",
                dir.display(),
                e
            ))
        })?;
        fs::remove_file(&probe).ok();
        Ok(())
    }

    pub fn date_range(&self) -> SceneResult<DateRange> {
        DateRange::new(self.search.start, self.search.end)
            .map_err(|e| SceneError::InvalidConfig(e.to_string()))
    }

    pub fn aoi(&self) -> SceneResult<BoundingBox> {
        let [min_x, min_y, max_x, max_y] = self.search.bbox;
        Ok(BoundingBox::checked(
            min_x,
            min_y,
            max_x,
            max_y,
            self.search.bbox_crs,
        )?)
    }

    /// Bands to request in the full download, before fmask is appended.
    pub fn requested_assets(&self) -> Vec<String> {
        match self.processing.index {
            Some(index) => index.required_assets(),
            None => self.processing.assets.clone(),
        }
    }

    pub fn query_parameters(&self) -> SceneResult<QueryParameters> {
        let resolution = self.coverage.resolution;
        Ok(QueryParameters::new(self.aoi()?, self.date_range()?)
            .with_collections(self.search.collections.clone())
            .with_assets(self.requested_assets())
            .with_output(self.coverage.output_crs, (resolution, resolution))
            .with_limit(self.search.limit))
    }

    pub fn coverage_builder(&self) -> CoverageRequestBuilder {
        CoverageRequestBuilder::new(self.coverage.wcs_endpoint.clone())
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            nodata: self.processing.nodata,
            valid_classes: self.processing.valid_classes,
            non_finite: self.processing.non_finite,
            keep_mask: self.processing.keep_mask,
        }
    }

    pub fn download_config(&self) -> DownloadConfig {
        let settings = &self.download;
        DownloadConfig {
            max_retries: settings.max_retries,
            initial_retry_delay: Duration::from_secs(settings.initial_retry_delay_secs),
            max_retry_delay: Duration::from_secs(settings.max_retry_delay_secs),
            request_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}
