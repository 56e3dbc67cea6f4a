//! Common test fixtures for scene pipeline tests.
//!
//! This module provides pre-defined areas of interest and builders for
//! catalog search responses.

use serde_json::{json, Value};

/// Common bounding box definitions for testing, as (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Small area around Canberra in WGS84 degrees
    pub const CANBERRA_WGS84: (f64, f64, f64, f64) = (149.05, -35.35, 149.15, -35.25);

    /// A single Landsat-scene sized footprint over Canberra in WGS84 degrees
    pub const CANBERRA_SCENE: (f64, f64, f64, f64) = (148.0, -36.0, 150.5, -34.0);

    /// Footprint east of the Canberra AOI with no overlap
    pub const EAST_OF_CANBERRA: (f64, f64, f64, f64) = (151.0, -36.0, 153.0, -34.0);
}

/// Common time values for testing.
pub mod time {
    /// First day of Landsat 7 SLC-off imagery
    pub const SLC_OFF_DATE: &str = "2003-05-31";
}

/// Build a single STAC item the way the catalog search endpoint returns it.
pub fn stac_feature(id: &str, datetime: &str, platform: &str, collection: &str) -> Value {
    stac_feature_with_bbox(id, datetime, platform, collection, bbox::CANBERRA_SCENE)
}

/// Build a STAC item with an explicit footprint bbox.
pub fn stac_feature_with_bbox(
    id: &str,
    datetime: &str,
    platform: &str,
    collection: &str,
    bbox: (f64, f64, f64, f64),
) -> Value {
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "collection": collection,
        "bbox": [bbox.0, bbox.1, bbox.2, bbox.3],
        "geometry": null,
        "properties": {
            "datetime": datetime,
            "platform": platform,
            "eo:cloud_cover": 12.5,
            "odc:product": collection
        },
        "assets": {
            "nbart_blue": { "href": format!("s3://dea/{}/blue.tif", id) },
            "nbart_red": { "href": format!("s3://dea/{}/red.tif", id) },
            "nbart_nir": { "href": format!("s3://dea/{}/nir.tif", id) },
            "oa_fmask": { "href": format!("s3://dea/{}/fmask.tif", id) }
        },
        "links": []
    })
}

/// Build a FeatureCollection page, optionally pointing at a next page.
pub fn stac_page(features: Vec<Value>, next: Option<&str>) -> Value {
    let mut links = vec![json!({ "rel": "self", "href": "http://localhost/stac/search" })];
    if let Some(href) = next {
        links.push(json!({ "rel": "next", "href": href }));
    }

    let returned = features.len();
    json!({
        "type": "FeatureCollection",
        "features": features,
        "links": links,
        "numberReturned": returned,
    })
}

/// A temporary directory removed when dropped.
pub fn temp_output_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e))
}
