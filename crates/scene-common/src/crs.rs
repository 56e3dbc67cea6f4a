//! Coordinate Reference System codes understood by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG codes the projection crate can transform between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CrsRepr", into = "u32")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// GDA94 / Australian Albers (meters)
    Epsg3577,
    /// WGS84 / UTM north, zone 1-60
    UtmNorth(u8),
    /// WGS84 / UTM south, zone 1-60
    UtmSouth(u8),
}

impl CrsCode {
    /// Resolve a raw EPSG integer.
    pub fn from_epsg(code: u32) -> Result<Self, CrsParseError> {
        match code {
            4326 => Ok(CrsCode::Epsg4326),
            3857 | 900913 => Ok(CrsCode::Epsg3857),
            3577 => Ok(CrsCode::Epsg3577),
            32601..=32660 => Ok(CrsCode::UtmNorth((code - 32600) as u8)),
            32701..=32760 => Ok(CrsCode::UtmSouth((code - 32700) as u8)),
            _ => Err(CrsParseError::UnsupportedCrs(code.to_string())),
        }
    }

    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:3577"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "32755" (bare code)
    pub fn from_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(CrsCode::Epsg4326);
        }

        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        let code: u32 = digits
            .parse()
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))?;
        Self::from_epsg(code)
    }

    /// The numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg3577 => 3577,
            CrsCode::UtmNorth(zone) => 32600 + *zone as u32,
            CrsCode::UtmSouth(zone) => 32700 + *zone as u32,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl From<CrsCode> for u32 {
    fn from(crs: CrsCode) -> u32 {
        crs.epsg()
    }
}

/// Config files may carry either `3577` or `"EPSG:3577"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CrsRepr {
    Code(u32),
    Name(String),
}

impl TryFrom<CrsRepr> for CrsCode {
    type Error = CrsParseError;

    fn try_from(repr: CrsRepr) -> Result<Self, Self::Error> {
        match repr {
            CrsRepr::Code(code) => CrsCode::from_epsg(code),
            CrsRepr::Name(name) => CrsCode::from_string(&name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(
            CrsCode::from_string("EPSG:4326").unwrap(),
            CrsCode::Epsg4326
        );
        assert_eq!(
            CrsCode::from_string("epsg:3577").unwrap(),
            CrsCode::Epsg3577
        );
        assert_eq!(CrsCode::from_string("CRS:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(
            CrsCode::from_string("32755").unwrap(),
            CrsCode::UtmSouth(55)
        );
        assert!(CrsCode::from_string("EPSG:99999").is_err());
        assert!(CrsCode::from_string("EPSG:32600").is_err());
    }

    #[test]
    fn test_epsg_display() {
        assert_eq!(CrsCode::UtmNorth(30).epsg(), 32630);
        assert_eq!(CrsCode::Epsg3577.to_string(), "EPSG:3577");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let a: CrsCode = serde_json::from_str("3577").unwrap();
        let b: CrsCode = serde_json::from_str("\"EPSG:3577\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<CrsCode>("1234").is_err());
    }
}
