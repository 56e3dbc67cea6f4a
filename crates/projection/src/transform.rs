//! Point and bounding box transforms between supported CRSs.

use scene_common::{BoundingBox, CrsCode, SceneError, SceneResult};

use crate::albers::AlbersEqualArea;
use crate::mercator::WebMercator;
use crate::transverse_mercator::TransverseMercator;

/// Convert a coordinate in `crs` to WGS84 lon/lat degrees.
fn to_geographic(crs: CrsCode, x: f64, y: f64) -> (f64, f64) {
    match crs {
        CrsCode::Epsg4326 => (x, y),
        CrsCode::Epsg3857 => WebMercator.inverse(x, y),
        CrsCode::Epsg3577 => AlbersEqualArea::australian_albers().inverse(x, y),
        CrsCode::UtmNorth(zone) => TransverseMercator::utm(zone, true).inverse(x, y),
        CrsCode::UtmSouth(zone) => TransverseMercator::utm(zone, false).inverse(x, y),
    }
}

/// Convert WGS84 lon/lat degrees to a coordinate in `crs`.
fn from_geographic(crs: CrsCode, lon: f64, lat: f64) -> (f64, f64) {
    match crs {
        CrsCode::Epsg4326 => (lon, lat),
        CrsCode::Epsg3857 => WebMercator.forward(lon, lat),
        CrsCode::Epsg3577 => AlbersEqualArea::australian_albers().forward(lon, lat),
        CrsCode::UtmNorth(zone) => TransverseMercator::utm(zone, true).forward(lon, lat),
        CrsCode::UtmSouth(zone) => TransverseMercator::utm(zone, false).forward(lon, lat),
    }
}

/// Reproject a single coordinate.
pub fn reproject_point(x: f64, y: f64, source: CrsCode, target: CrsCode) -> SceneResult<(f64, f64)> {
    if source == target {
        return Ok((x, y));
    }

    let (lon, lat) = to_geographic(source, x, y);
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
        return Err(SceneError::Projection(format!(
            "({}, {}) in {} has no geographic equivalent",
            x, y, source
        )));
    }

    let (tx, ty) = from_geographic(target, lon, lat);
    if !tx.is_finite() || !ty.is_finite() {
        return Err(SceneError::Projection(format!(
            "({}, {}) cannot be projected to {}",
            lon, lat, target
        )));
    }

    Ok((tx, ty))
}

/// Reproject a bounding box into `target`, returning the envelope of the result.
///
/// Corners and edge midpoints are transformed, so curved edges in the
/// target CRS are enclosed better than by transforming two corners only.
pub fn reproject_bbox(bbox: &BoundingBox, target: CrsCode) -> SceneResult<BoundingBox> {
    bbox.validate()?;

    if bbox.crs == target {
        return Ok(*bbox);
    }

    let mid_x = (bbox.min_x + bbox.max_x) / 2.0;
    let mid_y = (bbox.min_y + bbox.max_y) / 2.0;
    let samples = [
        // Corners
        (bbox.min_x, bbox.min_y),
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
        // Edge midpoints
        (mid_x, bbox.min_y),
        (mid_x, bbox.max_y),
        (bbox.min_x, mid_y),
        (bbox.max_x, mid_y),
    ];

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for (x, y) in samples {
        let (tx, ty) = reproject_point(x, y, bbox.crs, target)?;
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }

    Ok(BoundingBox::new(min_x, min_y, max_x, max_y, target))
}

/// Reproject `[minx, miny, maxx, maxy]` between raw EPSG codes.
///
/// Fails with a projection error when either code is not supported.
pub fn reproject_bbox_epsg(
    coords: [f64; 4],
    source_epsg: u32,
    target_epsg: u32,
) -> SceneResult<BoundingBox> {
    let source = CrsCode::from_epsg(source_epsg)?;
    let target = CrsCode::from_epsg(target_epsg)?;
    let bbox = BoundingBox::new(coords[0], coords[1], coords[2], coords[3], source);
    reproject_bbox(&bbox, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_crs_is_identity() {
        let bbox = BoundingBox::wgs84(149.0, -35.4, 149.2, -35.2);
        assert_eq!(reproject_bbox(&bbox, CrsCode::Epsg4326).unwrap(), bbox);
    }

    #[test]
    fn test_unsupported_epsg_is_error() {
        let result = reproject_bbox_epsg([0.0, 0.0, 1.0, 1.0], 4326, 2193);
        assert!(matches!(result, Err(SceneError::Projection(_))));

        let result = reproject_bbox_epsg([0.0, 0.0, 1.0, 1.0], 9999, 4326);
        assert!(matches!(result, Err(SceneError::Projection(_))));
    }

    #[test]
    fn test_off_globe_latitude_is_error() {
        let result = reproject_point(0.0, 95.0, CrsCode::Epsg4326, CrsCode::Epsg3577);
        assert!(matches!(result, Err(SceneError::Projection(_))));
    }

    #[test]
    fn test_inverted_bbox_is_rejected() {
        let bbox = BoundingBox::wgs84(150.0, -35.0, 149.0, -36.0);
        assert!(reproject_bbox(&bbox, CrsCode::Epsg3577).is_err());
    }
}
