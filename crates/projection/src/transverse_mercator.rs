//! Transverse Mercator projection for WGS84 / UTM zones (EPSG 326xx, 327xx).
//!
//! Series expansions from Snyder (1987), USGS Professional Paper 1395,
//! pp. 61-64. Accurate to millimetres within a zone.

// WGS84 ellipsoid constants
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
/// UTM scale factor on the central meridian
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A single UTM zone.
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    pub zone: u8,
    pub north: bool,
    /// Central meridian in radians
    lon0: f64,
}

impl TransverseMercator {
    pub fn utm(zone: u8, north: bool) -> Self {
        let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();
        Self { zone, north, lon0 }
    }

    /// Project lon/lat degrees to UTM easting/northing meters.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = E_PRIME2 * cos_lat * cos_lat;
        let a = cos_lat * (lon - self.lon0);

        let m = meridional_arc(lat);

        let a2 = a * a;
        let a4 = a2 * a2;
        let a6 = a4 * a2;

        // Snyder eq. 8-9
        let easting = K0
            * n
            * (a + (1.0 - t + c) * a2 * a / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
            + FALSE_EASTING;

        // Snyder eq. 8-10
        let northing = K0
            * (m + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

        if self.north {
            (easting, northing)
        } else {
            (easting, northing + FALSE_NORTHING_SOUTH)
        }
    }

    /// Unproject UTM easting/northing meters to lon/lat degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let x = easting - FALSE_EASTING;
        let y = if self.north {
            northing
        } else {
            northing - FALSE_NORTHING_SOUTH
        };

        // Footpoint latitude, Snyder eq. 3-26 and 7-19
        let m = y / K0;
        let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));
        let sqrt_1me2 = (1.0 - E2).sqrt();
        let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();

        let c1 = E_PRIME2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let n1 = A / (1.0 - E2 * sin1 * sin1).sqrt();
        let r1 = A * (1.0 - E2) / (1.0 - E2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * K0);

        let d2 = d * d;
        let d4 = d2 * d2;
        let d6 = d4 * d2;

        // Snyder eq. 8-17 and 8-18
        let lat = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * E_PRIME2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        let lon = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                    * d4
                    * d
                    / 120.0)
                / cos1;

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Meridional arc from equator to latitude `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}
