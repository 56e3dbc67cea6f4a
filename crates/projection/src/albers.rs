//! Albers Equal Area Conic projection on an ellipsoid.
//!
//! Used for the Australian national grid (EPSG:3577, GDA94 / Australian Albers):
//! - Standard parallels: 18°S and 36°S
//! - Latitude of origin: 0°
//! - Central meridian: 132°E
//! - False easting/northing: 0
//!
//! Formulas follow Snyder (1987), USGS Professional Paper 1395, pp. 101-102.

/// GRS80 semi-major axis (meters)
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 flattening
const GRS80_F: f64 = 1.0 / 298.257_222_101;

/// Albers Equal Area Conic projection parameters.
#[derive(Debug, Clone)]
pub struct AlbersEqualArea {
    /// Central meridian in radians
    pub lon0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    /// Semi-major axis (meters)
    a: f64,
    /// First eccentricity
    e: f64,
    /// Eccentricity squared
    e2: f64,
    /// Cone constant
    n: f64,
    /// Snyder's C
    c: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl AlbersEqualArea {
    /// Create a projection from standard parallels, origin and ellipsoid (degrees).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lat1_deg: f64,
        lat2_deg: f64,
        lat0_deg: f64,
        lon0_deg: f64,
        false_easting: f64,
        false_northing: f64,
        a: f64,
        flattening: f64,
    ) -> Self {
        let e2 = 2.0 * flattening - flattening * flattening;
        let e = e2.sqrt();

        let lat1 = lat1_deg.to_radians();
        let lat2 = lat2_deg.to_radians();
        let lat0 = lat0_deg.to_radians();

        let m1 = Self::m(lat1, e2);
        let m2 = Self::m(lat2, e2);
        let q1 = Self::q(lat1, e, e2);
        let q2 = Self::q(lat2, e, e2);
        let q0 = Self::q(lat0, e, e2);

        let n = if (lat1 - lat2).abs() < 1e-10 {
            lat1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).sqrt() / n;

        Self {
            lon0: lon0_deg.to_radians(),
            false_easting,
            false_northing,
            a,
            e,
            e2,
            n,
            c,
            rho0,
        }
    }

    /// GDA94 / Australian Albers (EPSG:3577).
    pub fn australian_albers() -> Self {
        Self::new(-18.0, -36.0, 0.0, 132.0, 0.0, 0.0, GRS80_A, GRS80_F)
    }

    /// Snyder eq. 14-15
    fn m(lat: f64, e2: f64) -> f64 {
        let sin = lat.sin();
        lat.cos() / (1.0 - e2 * sin * sin).sqrt()
    }

    /// Snyder eq. 3-12
    fn q(lat: f64, e: f64, e2: f64) -> f64 {
        let sin = lat.sin();
        (1.0 - e2)
            * (sin / (1.0 - e2 * sin * sin)
                - (1.0 / (2.0 * e)) * ((1.0 - e * sin) / (1.0 + e * sin)).ln())
    }

    /// Project lon/lat degrees to easting/northing meters.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let q = Self::q(lat, self.e, self.e2);
        let rho = self.a * (self.c - self.n * q).sqrt() / self.n;
        let theta = self.n * (lon_deg.to_radians() - self.lon0);

        let x = self.false_easting + rho * theta.sin();
        let y = self.false_northing + self.rho0 - rho * theta.cos();
        (x, y)
    }

    /// Unproject easting/northing meters to lon/lat degrees.
    ///
    /// Latitude is recovered by Newton iteration on Snyder eq. 3-16.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let x = x - self.false_easting;
        let y = self.rho0 - (y - self.false_northing);

        // For a cone opening south (n < 0) the signs of x, y and rho flip
        let (xs, ys) = if self.n < 0.0 { (-x, -y) } else { (x, y) };
        let rho = xs.hypot(ys).copysign(self.n);
        let theta = xs.atan2(ys);

        let q = (self.c - (rho * self.n / self.a).powi(2)) / self.n;

        let mut lat = (q / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..30 {
            let sin = lat.sin();
            let one_minus = 1.0 - self.e2 * sin * sin;
            let delta = one_minus * one_minus / (2.0 * lat.cos())
                * (q / (1.0 - self.e2) - sin / one_minus
                    + (1.0 / (2.0 * self.e)) * ((1.0 - self.e * sin) / (1.0 + self.e * sin)).ln());
            lat += delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }

        let lon = self.lon0 + theta / self.n;
        (lon.to_degrees(), lat.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(132.0, 0.0);
        assert!(x.abs() < 1e-6, "x should be 0, got {}", x);
        assert!(y.abs() < 1e-6, "y should be 0, got {}", y);
    }

    #[test]
    fn test_canberra() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(149.13, -35.28);
        assert!((x - 1_550_570.62).abs() < 1.0, "x = {}", x);
        assert!((y - (-3_957_368.59)).abs() < 1.0, "y = {}", y);
    }

    #[test]
    fn test_central_meridian_has_zero_easting() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(132.0, -25.0);
        assert!(x.abs() < 1e-6);
        assert!(y < 0.0);
    }

    #[test]
    fn test_roundtrip_across_continent() {
        let proj = AlbersEqualArea::australian_albers();
        for (lon, lat) in [(149.13, -35.28), (115.86, -31.95), (130.84, -12.46), (147.33, -42.88)] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y);
            assert!((lon2 - lon).abs() < 1e-9, "lon {} vs {}", lon2, lon);
            assert!((lat2 - lat).abs() < 1e-9, "lat {} vs {}", lat2, lat);
        }
    }
}
