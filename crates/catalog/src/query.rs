//! Search and coverage query parameters.

use serde::{Deserialize, Serialize};

use projection::reproject_bbox;
use scene_common::{BoundingBox, CrsCode, DateRange, SceneError, SceneResult};

/// Default number of items requested per catalog page.
pub const DEFAULT_PAGE_LIMIT: u32 = 500;

/// Default output pixel size in target CRS units.
pub const DEFAULT_RESOLUTION: f64 = 30.0;

/// A scene collection the catalog is known to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub label: &'static str,
    pub platform: &'static str,
}

impl Collection {
    pub const KNOWN: [Collection; 3] = [
        Collection {
            name: "ga_ls5t_ard_3",
            label: "Landsat 5 TM",
            platform: "landsat-5",
        },
        Collection {
            name: "ga_ls7e_ard_3",
            label: "Landsat 7 ETM+",
            platform: "landsat-7",
        },
        Collection {
            name: "ga_ls8c_ard_3",
            label: "Landsat 8 OLI",
            platform: "landsat-8",
        },
    ];

    pub fn lookup(name: &str) -> Option<&'static Collection> {
        Self::KNOWN.iter().find(|c| c.name == name)
    }
}

/// Everything needed to search the catalog and request coverages.
///
/// `aoi` may be in any supported CRS. It is reprojected to WGS84 for the
/// catalog search and to `output_crs` for coverage requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
    pub collections: Vec<String>,
    pub assets: Vec<String>,
    pub dates: DateRange,
    pub aoi: BoundingBox,
    pub output_crs: CrsCode,
    pub resolution: (f64, f64),
    pub limit: u32,
}

impl QueryParameters {
    pub fn new(aoi: BoundingBox, dates: DateRange) -> Self {
        Self {
            collections: Collection::KNOWN.iter().map(|c| c.name.to_string()).collect(),
            assets: Vec::new(),
            dates,
            aoi,
            output_crs: CrsCode::Epsg3577,
            resolution: (DEFAULT_RESOLUTION, DEFAULT_RESOLUTION),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_assets(mut self, assets: Vec<String>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_output(mut self, crs: CrsCode, resolution: (f64, f64)) -> Self {
        self.output_crs = crs;
        self.resolution = resolution;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// The AOI in WGS84, as the catalog expects it.
    pub fn search_bbox(&self) -> SceneResult<BoundingBox> {
        reproject_bbox(&self.aoi, CrsCode::Epsg4326)
    }

    /// The AOI in the output CRS, as coverage requests expect it.
    pub fn coverage_bbox(&self) -> SceneResult<BoundingBox> {
        reproject_bbox(&self.aoi, self.output_crs)
    }

    /// Build the first-page search URL for one collection.
    pub fn search_url(&self, endpoint: &str, collection: &str) -> SceneResult<String> {
        let bbox = self.search_bbox()?;
        let params = [
            ("collection", collection.to_string()),
            ("time", self.dates.to_query_string()),
            ("bbox", format!("[{}]", bbox.to_query_string())),
            ("limit", self.limit.to_string()),
        ];

        let url = reqwest::Url::parse_with_params(endpoint, &params)
            .map_err(|e| SceneError::Catalog(format!("invalid endpoint {}: {}", endpoint, e)))?;
        Ok(url.to_string())
    }
}
