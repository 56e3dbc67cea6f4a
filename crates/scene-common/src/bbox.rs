//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::crs::CrsCode;

/// A geographic or projected bounding box tagged with its CRS.
///
/// For geographic CRS (EPSG:4326), coordinates are lon/lat degrees.
/// For projected CRS (EPSG:3577, UTM, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub crs: CrsCode,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: CrsCode) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        }
    }

    /// Create a WGS84 lon/lat box.
    pub fn wgs84(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self::new(min_lon, min_lat, max_lon, max_lat, CrsCode::Epsg4326)
    }

    /// Create a bounding box, rejecting non-finite or inverted corners.
    pub fn checked(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        crs: CrsCode,
    ) -> Result<Self, BboxParseError> {
        let bbox = Self::new(min_x, min_y, max_x, max_y, crs);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse "minx,miny,maxx,maxy" (optionally wrapped in brackets).
    pub fn from_string(s: &str, crs: CrsCode) -> Result<Self, BboxParseError> {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Self::checked(values[0], values[1], values[2], values[3], crs)
    }

    /// Check the min <= max invariant on both axes.
    pub fn validate(&self) -> Result<(), BboxParseError> {
        let corners = [self.min_x, self.min_y, self.max_x, self.max_y];
        if corners.iter().any(|v| !v.is_finite()) {
            return Err(BboxParseError::NonFinite);
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(BboxParseError::Inverted(self.to_query_string()));
        }
        Ok(())
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    ///
    /// Both boxes are assumed to share a CRS; the result keeps `self.crs`.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
            crs: self.crs,
        })
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if `other` lies entirely inside this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.contains_point(other.min_x, other.min_y) && self.contains_point(other.max_x, other.max_y)
    }

    /// "minx,miny,maxx,maxy" as used in catalog and coverage queries.
    pub fn to_query_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("BBOX has min greater than max: {0}")]
    Inverted(String),

    #[error("BBOX contains non-finite coordinates")]
    NonFinite,
}
