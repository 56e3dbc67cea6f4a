//! Landsat scene downloader.
//!
//! Searches the DEA STAC catalog, keeps the first scene per day, checks each
//! scene's fmask coverage and downloads the survivors with invalid pixels
//! masked or reduced to a spectral index.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use raster::SpectralIndex;
use scene_common::CrsCode;
use scene_downloader::{Pipeline, RunConfig, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "scene-downloader")]
#[command(about = "Download cloud-masked Landsat scenes from Digital Earth Australia")]
struct Args {
    /// YAML run configuration
    #[arg(short, long, env = "SCENE_CONFIG")]
    config: Option<PathBuf>,

    /// Area of interest as min_x,min_y,max_x,max_y
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    bbox: Option<Vec<f64>>,

    /// CRS of --bbox (e.g. EPSG:4326)
    #[arg(long)]
    bbox_crs: Option<String>,

    /// First acquisition date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last acquisition date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Collections to search
    #[arg(long, value_delimiter = ',')]
    collections: Option<Vec<String>>,

    /// Raw bands to download
    #[arg(long, value_delimiter = ',')]
    assets: Option<Vec<String>>,

    /// Spectral index to compute instead of raw bands
    #[arg(long)]
    index: Option<SpectralIndex>,

    /// Maximum cloud cover percentage
    #[arg(long)]
    cloud_cover: Option<f64>,

    /// Directory for output rasters
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum retry attempts per download
    #[arg(long)]
    max_retries: Option<u32>,

    /// Keep Landsat 7 scenes acquired after the SLC failure
    #[arg(long)]
    include_slc_off: bool,

    /// Leave the fmask band out of masked output
    #[arg(long)]
    drop_mask: bool,

    /// STAC search endpoint
    #[arg(long, env = "STAC_ENDPOINT")]
    stac_endpoint: Option<String>,

    /// WCS endpoint
    #[arg(long, env = "WCS_ENDPOINT")]
    wcs_endpoint: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

impl Args {
    /// Load the config file (if any) and apply command-line overrides.
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => {
                let (Some(start), Some(end), Some(bbox)) = (self.start, self.end, self.bbox()?)
                else {
                    bail!("--start, --end and --bbox are required without --config");
                };
                RunConfig::new(start, end, bbox)
            }
        };

        let search = &mut config.search;
        if let Some(bbox) = self.bbox()? {
            search.bbox = bbox;
        }
        if let Some(crs) = &self.bbox_crs {
            search.bbox_crs = CrsCode::from_string(crs)
                .with_context(|| format!("Invalid bbox CRS: {}", crs))?;
        }
        if let Some(start) = self.start {
            search.start = start;
        }
        if let Some(end) = self.end {
            search.end = end;
        }
        if let Some(collections) = &self.collections {
            search.collections = collections.clone();
        }
        if let Some(endpoint) = &self.stac_endpoint {
            search.stac_endpoint = endpoint.clone();
        }
        search.include_slc_off |= self.include_slc_off;

        if let Some(endpoint) = &self.wcs_endpoint {
            config.coverage.wcs_endpoint = endpoint.clone();
        }

        let processing = &mut config.processing;
        if let Some(assets) = &self.assets {
            processing.assets = assets.clone();
            processing.index = None;
        }
        if let Some(index) = self.index {
            processing.index = Some(index);
            processing.assets.clear();
        }
        if let Some(cloud_cover) = self.cloud_cover {
            processing.cloud_cover = cloud_cover;
        }
        processing.drop_mask |= self.drop_mask;

        if let Some(concurrency) = self.concurrency {
            config.download.concurrency = concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.download.max_retries = max_retries;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }

        Ok(config)
    }

    fn bbox(&self) -> Result<Option<[f64; 4]>> {
        match &self.bbox {
            None => Ok(None),
            Some(values) => match values.as_slice() {
                [min_x, min_y, max_x, max_y] => Ok(Some([*min_x, *min_y, *max_x, *max_y])),
                _ => bail!("--bbox needs exactly four values, got {}", values.len()),
            },
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let config = args.run_config()?;
    config.validate().context("Invalid run configuration")?;

    info!(
        collections = ?config.search.collections,
        start = %config.search.start,
        end = %config.search.end,
        output_dir = %config.output_dir.display(),
        "Starting scene downloader"
    );

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    let pipeline = Pipeline::new(config, shutdown_rx).context("Failed to set up pipeline")?;
    let summary = pipeline.run().await.context("Scene pipeline failed")?;

    match summary.status {
        RunStatus::NoFeatures => warn!("No scenes matched the search"),
        RunStatus::NoSurvivors => warn!("No scenes passed the validity check"),
        RunStatus::Cancelled => warn!("Run cancelled before completion"),
        RunStatus::Completed { written, failed } => {
            info!(written, failed, "Scenes downloaded");
        }
    }

    Ok(())
}
