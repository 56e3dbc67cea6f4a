//! Post-search feature filters.
//!
//! All filters are pure: they take ownership of a feature list and return
//! the survivors in a deterministic order.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use projection::reproject_bbox;
use scene_common::time::solar_day;
use scene_common::{BoundingBox, CrsCode, SceneResult};

use crate::models::Feature;

/// Platform affected by the Landsat 7 scan line corrector failure.
pub const SLC_OFF_PLATFORM: &str = "landsat-7";

/// First acquisition date with the scan line corrector off.
pub fn slc_off_start() -> NaiveDate {
    // 2003-05-31 is a valid calendar date
    NaiveDate::from_ymd_opt(2003, 5, 31).unwrap_or_default()
}

/// Drop Landsat 7 acquisitions from the SLC-off era unless they are wanted.
pub fn remove_slc_off(features: Vec<Feature>, include_slc_off: bool) -> Vec<Feature> {
    if include_slc_off {
        return features;
    }

    let cutoff = slc_off_start();
    let before = features.len();
    let kept: Vec<Feature> = features
        .into_iter()
        .filter(|f| !(f.platform == SLC_OFF_PLATFORM && solar_day(&f.datetime) >= cutoff))
        .collect();

    debug!(removed = before - kept.len(), "Removed SLC-off features");
    kept
}

/// Drop features whose footprint lies too far outside the query box.
///
/// The share of each footprint's area outside `query_bbox` is compared
/// against `max_outside_pct` (0..=100). The polygon footprint is used when
/// it has area, the bbox envelope otherwise. Features with neither are
/// kept. A zero-area envelope counts as fully outside unless the query
/// box contains it.
pub fn remove_overshoot(
    features: Vec<Feature>,
    query_bbox: &BoundingBox,
    max_outside_pct: f64,
) -> SceneResult<Vec<Feature>> {
    let query = reproject_bbox(query_bbox, CrsCode::Epsg4326)?;

    let before = features.len();
    let kept: Vec<Feature> = features
        .into_iter()
        .filter(|f| match feature_outside_fraction(f, &query) {
            Some(fraction) => fraction * 100.0 <= max_outside_pct,
            None => true,
        })
        .collect();

    debug!(removed = before - kept.len(), "Removed overshooting features");
    Ok(kept)
}

fn feature_outside_fraction(feature: &Feature, query: &BoundingBox) -> Option<f64> {
    let area: f64 = feature.footprint.iter().map(|r| ring_area(r)).sum();
    if area > 0.0 {
        let inside: f64 = feature
            .footprint
            .iter()
            .map(|r| ring_area(&clip_ring(r, query)))
            .sum();
        return Some(((area - inside) / area).clamp(0.0, 1.0));
    }
    feature.bbox.as_ref().map(|b| outside_fraction(b, query))
}

fn outside_fraction(footprint: &BoundingBox, query: &BoundingBox) -> f64 {
    let area = footprint.area();
    if area <= 0.0 {
        return if query.contains(footprint) { 0.0 } else { 1.0 };
    }

    let inside = footprint
        .intersection(query)
        .map(|b| b.area())
        .unwrap_or(0.0);
    ((area - inside) / area).clamp(0.0, 1.0)
}

/// Shoelace area of a ring; closed or open rings give the same result.
fn ring_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let twice: f64 = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|((x0, y0), (x1, y1))| x0 * y1 - x1 * y0)
        .sum();
    twice.abs() / 2.0
}

/// One side of the clip rectangle.
#[derive(Clone, Copy)]
enum Edge {
    MinX(f64),
    MaxX(f64),
    MinY(f64),
    MaxY(f64),
}

impl Edge {
    fn inside(self, (x, y): (f64, f64)) -> bool {
        match self {
            Edge::MinX(v) => x >= v,
            Edge::MaxX(v) => x <= v,
            Edge::MinY(v) => y >= v,
            Edge::MaxY(v) => y <= v,
        }
    }

    /// Where segment `a`-`b` crosses this edge; the endpoints lie on
    /// opposite sides.
    fn crossing(self, (ax, ay): (f64, f64), (bx, by): (f64, f64)) -> (f64, f64) {
        let t = match self {
            Edge::MinX(v) | Edge::MaxX(v) => (v - ax) / (bx - ax),
            Edge::MinY(v) | Edge::MaxY(v) => (v - ay) / (by - ay),
        };
        (ax + t * (bx - ax), ay + t * (by - ay))
    }
}

/// Sutherland-Hodgman clip of a ring against an axis-aligned box.
fn clip_ring(ring: &[(f64, f64)], rect: &BoundingBox) -> Vec<(f64, f64)> {
    let edges = [
        Edge::MinX(rect.min_x),
        Edge::MaxX(rect.max_x),
        Edge::MinY(rect.min_y),
        Edge::MaxY(rect.max_y),
    ];

    let mut points = ring.to_vec();
    for edge in edges {
        if points.is_empty() {
            break;
        }
        let mut clipped = Vec::with_capacity(points.len() + 1);
        let mut previous = points[points.len() - 1];
        for &current in &points {
            match (edge.inside(previous), edge.inside(current)) {
                (true, true) => clipped.push(current),
                (true, false) => clipped.push(edge.crossing(previous, current)),
                (false, true) => {
                    clipped.push(edge.crossing(previous, current));
                    clipped.push(current);
                }
                (false, false) => {}
            }
            previous = current;
        }
        points = clipped;
    }
    points
}

/// Stable ascending sort by acquisition time.
pub fn sort_by_date(mut features: Vec<Feature>) -> Vec<Feature> {
    features.sort_by_key(|f| f.datetime);
    features
}

/// Keep only the earliest acquisition of each calendar day.
pub fn group_by_solar_day(features: Vec<Feature>) -> Vec<Feature> {
    let mut seen = HashSet::new();
    sort_by_date(features)
        .into_iter()
        .filter(|f| seen.insert(solar_day(&f.datetime)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_common::time::parse_datetime;
    use std::collections::BTreeSet;
    use test_utils::assert_approx_eq;

    fn feature(id: &str, datetime: &str, platform: &str, bbox: Option<BoundingBox>) -> Feature {
        Feature {
            id: id.to_string(),
            datetime: parse_datetime(datetime).unwrap(),
            platform: platform.to_string(),
            collection: "ga_ls7e_ard_3".to_string(),
            bbox,
            footprint: Vec::new(),
            assets: BTreeSet::new(),
        }
    }

    fn ids(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_slc_off_removed_from_cutoff_date() {
        let features = vec![
            feature("before", "2003-05-30T23:00:00Z", "landsat-7", None),
            feature("on", "2003-05-31T00:10:00Z", "landsat-7", None),
            feature("other", "2010-01-01T00:00:00Z", "landsat-5", None),
        ];

        let kept = remove_slc_off(features.clone(), false);
        assert_eq!(ids(&kept), vec!["before", "other"]);

        let all = remove_slc_off(features, true);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_group_by_solar_day_keeps_earliest() {
        let features = vec![
            feature("b-late", "2020-01-02T10:00:00Z", "landsat-8", None),
            feature("a", "2020-01-01T23:50:00Z", "landsat-8", None),
            feature("b-early", "2020-01-02T00:05:00Z", "landsat-7", None),
        ];

        let grouped = group_by_solar_day(features);
        assert_eq!(ids(&grouped), vec!["a", "b-early"]);
    }

    #[test]
    fn test_group_by_solar_day_is_idempotent() {
        let features = vec![
            feature("x", "2020-02-01T00:00:00Z", "landsat-8", None),
            feature("y", "2020-02-01T01:00:00Z", "landsat-8", None),
            feature("z", "2020-02-03T00:00:00Z", "landsat-8", None),
        ];

        let once = group_by_solar_day(features);
        let twice = group_by_solar_day(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sort_by_date_is_stable() {
        let features = vec![
            feature("first", "2020-01-01T00:00:00Z", "landsat-8", None),
            feature("second", "2020-01-01T00:00:00Z", "landsat-8", None),
        ];
        assert_eq!(ids(&sort_by_date(features)), vec!["first", "second"]);
    }

    #[test]
    fn test_remove_overshoot() {
        let query = BoundingBox::wgs84(0.0, 0.0, 10.0, 10.0);
        let features = vec![
            // fully inside
            feature("inside", "2020-01-01T00:00:00Z", "landsat-8", Some(BoundingBox::wgs84(1.0, 1.0, 2.0, 2.0))),
            // half outside
            feature("half", "2020-01-02T00:00:00Z", "landsat-8", Some(BoundingBox::wgs84(5.0, 0.0, 15.0, 10.0))),
            // disjoint
            feature("outside", "2020-01-03T00:00:00Z", "landsat-8", Some(BoundingBox::wgs84(20.0, 20.0, 30.0, 30.0))),
            feature("unknown", "2020-01-04T00:00:00Z", "landsat-8", None),
        ];

        let kept = remove_overshoot(features.clone(), &query, 50.0).unwrap();
        assert_eq!(ids(&kept), vec!["inside", "half", "unknown"]);

        let strict = remove_overshoot(features, &query, 10.0).unwrap();
        assert_eq!(ids(&strict), vec!["inside", "unknown"]);
    }

    #[test]
    fn test_degenerate_footprint() {
        let query = BoundingBox::wgs84(0.0, 0.0, 10.0, 10.0);
        let point_inside = BoundingBox::wgs84(5.0, 5.0, 5.0, 5.0);
        let point_outside = BoundingBox::wgs84(50.0, 5.0, 50.0, 5.0);

        assert_eq!(outside_fraction(&point_inside, &query), 0.0);
        assert_eq!(outside_fraction(&point_outside, &query), 1.0);
    }

    /// A quadrilateral tilted like a Landsat path footprint.
    fn tilted() -> Vec<(f64, f64)> {
        vec![(2.0, 0.0), (12.0, 2.0), (10.0, 12.0), (0.0, 10.0), (2.0, 0.0)]
    }

    #[test]
    fn test_polygon_clip_area() {
        let query = BoundingBox::wgs84(0.0, 0.0, 10.0, 10.0);
        assert_approx_eq!(ring_area(&tilted()), 104.0, 1e-9);
        // 10.4 beyond x = 10 and 10 beyond y = 10
        assert_approx_eq!(ring_area(&clip_ring(&tilted(), &query)), 83.6, 1e-9);

        let far = BoundingBox::wgs84(50.0, 50.0, 60.0, 60.0);
        assert_eq!(ring_area(&clip_ring(&tilted(), &far)), 0.0);
    }

    #[test]
    fn test_remove_overshoot_uses_polygon_footprint() {
        let query = BoundingBox::wgs84(0.0, 0.0, 10.0, 10.0);
        let envelope = Some(BoundingBox::wgs84(0.0, 0.0, 12.0, 12.0));

        // the envelope is ~31% outside, the polygon only ~20%
        let mut polygon = feature("polygon", "2020-01-01T00:00:00Z", "landsat-8", envelope);
        polygon.footprint = vec![tilted()];
        let boxed = feature("boxed", "2020-01-02T00:00:00Z", "landsat-8", envelope);

        let kept = remove_overshoot(vec![polygon.clone(), boxed], &query, 25.0).unwrap();
        assert_eq!(ids(&kept), vec!["polygon"]);

        let fraction = feature_outside_fraction(&polygon, &query).unwrap();
        assert_approx_eq!(fraction, 20.4 / 104.0, 1e-9);
    }
}
