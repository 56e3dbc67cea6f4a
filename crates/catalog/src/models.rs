//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Lightweight serde models for item search responses, covering the subset
//! the pipeline needs: bbox, datetime, platform, pagination via `links` and
//! the asset names available for each scene.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scene_common::time::parse_datetime;
use scene_common::{BoundingBox, SceneError, SceneResult};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A STAC Item Collection (GeoJSON FeatureCollection), one page of results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type", default)]
    pub type_: String,

    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,

    #[serde(rename = "numberReturned", skip_serializing_if = "Option::is_none")]
    pub number_returned: Option<u64>,

    /// Older STAC APIs report counts under `context`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<StacContext>,
}

impl StacItemCollection {
    /// Find the `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    /// Matched count, from either `numberMatched` or `context.matched`.
    pub fn matched(&self) -> Option<u64> {
        self.number_matched
            .or_else(|| self.context.as_ref().and_then(|c| c.matched))
    }

    /// Returned count, falling back to the page length.
    pub fn returned(&self) -> u64 {
        self.number_returned
            .or_else(|| self.context.as_ref().and_then(|c| c.returned))
            .unwrap_or(self.features.len() as u64)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StacContext {
    #[serde(default)]
    pub matched: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    #[serde(rename = "type", default)]
    pub type_: String,

    pub id: String,

    /// GeoJSON geometry; polygon outer rings become the feature footprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,

    /// Bounding box `[west, south, east, north]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

/// Item properties; unknown keys are kept in `extra`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    pub datetime: Option<String>,

    #[serde(default)]
    pub platform: Option<String>,

    #[serde(rename = "eo:cloud_cover", default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A link from a STAC document; `rel == "next"` drives pagination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain type
// ---------------------------------------------------------------------------

/// One scene acquisition, reduced to what filtering and planning need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub id: String,
    pub datetime: DateTime<Utc>,
    pub platform: String,
    pub collection: String,
    /// Footprint envelope in WGS84, when the catalog supplies one.
    pub bbox: Option<BoundingBox>,
    /// Outer ring of each footprint polygon in WGS84 (lon, lat). Empty when
    /// the item has no polygon geometry.
    pub footprint: Vec<Vec<(f64, f64)>>,
    pub assets: BTreeSet<String>,
}

impl Feature {
    /// Convert a catalog item. `fallback_collection` is used when the item
    /// does not name its collection.
    pub fn from_item(item: StacItem, fallback_collection: &str) -> SceneResult<Self> {
        let raw = item.properties.datetime.as_deref().ok_or_else(|| {
            SceneError::Catalog(format!("item {} has no datetime", item.id))
        })?;
        let datetime = parse_datetime(raw)
            .map_err(|e| SceneError::Catalog(format!("item {}: {}", item.id, e)))?;

        let bbox = match item.bbox.as_deref() {
            Some([min_x, min_y, max_x, max_y]) => {
                Some(BoundingBox::wgs84(*min_x, *min_y, *max_x, *max_y))
            }
            // 3D boxes carry elevation as the third and sixth values
            Some([min_x, min_y, _, max_x, max_y, _]) => {
                Some(BoundingBox::wgs84(*min_x, *min_y, *max_x, *max_y))
            }
            _ => None,
        };
        let footprint = item.geometry.as_ref().map(outer_rings).unwrap_or_default();

        Ok(Self {
            platform: item.properties.platform.clone().unwrap_or_default(),
            collection: item
                .collection
                .clone()
                .unwrap_or_else(|| fallback_collection.to_string()),
            assets: item.assets.keys().cloned().collect(),
            id: item.id,
            datetime,
            bbox,
            footprint,
        })
    }
}

/// Outer rings of a GeoJSON `Polygon` or `MultiPolygon`.
fn outer_rings(geometry: &serde_json::Value) -> Vec<Vec<(f64, f64)>> {
    let coordinates = &geometry["coordinates"];
    let polygons: Vec<&serde_json::Value> = match geometry["type"].as_str() {
        Some("Polygon") => vec![coordinates],
        Some("MultiPolygon") => coordinates
            .as_array()
            .map(|polygons| polygons.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    polygons
        .into_iter()
        .filter_map(|polygon| polygon.get(0))
        .filter_map(ring)
        .filter(|points| points.len() >= 3)
        .collect()
}

fn ring(value: &serde_json::Value) -> Option<Vec<(f64, f64)>> {
    value
        .as_array()?
        .iter()
        .map(|position| Some((position.get(0)?.as_f64()?, position.get(1)?.as_f64()?)))
        .collect()
}
