//! Spherical Web Mercator (EPSG:3857).

use std::f64::consts::PI;

/// Sphere radius used by EPSG:3857 (WGS84 semi-major axis).
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit where the projection is square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Project lon/lat degrees to meters. Latitude is clamped to the square extent.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = EARTH_RADIUS * lon_deg.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
        (x, y)
    }

    /// Unproject meters to lon/lat degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        let (x, y) = WebMercator.forward(0.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_extent_is_square() {
        let (x, _) = WebMercator.forward(180.0, 0.0);
        let (_, y) = WebMercator.forward(0.0, MAX_LATITUDE);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-3);
        assert!((y - x).abs() < 1e-3);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = WebMercator.forward(149.13, -35.28);
        let (lon, lat) = WebMercator.inverse(x, y);
        assert!((lon - 149.13).abs() < 1e-10);
        assert!((lat + 35.28).abs() < 1e-10);
    }
}
