//! WCS 1.0.0 GetCoverage URL construction.

use chrono::NaiveDate;

use scene_common::time::DATE_FORMAT;
use scene_common::{BoundingBox, CrsCode, FMASK_ASSET};

/// Default public coverage endpoint.
pub const DEFAULT_WCS_ENDPOINT: &str = "https://ows.dea.ga.gov.au/wcs?service=WCS";

/// Builds GetCoverage URLs against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct CoverageRequestBuilder {
    endpoint: String,
}

impl Default for CoverageRequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_WCS_ENDPOINT)
    }
}

impl CoverageRequestBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.contains('?') {
            endpoint.push_str("?service=WCS");
        }
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a GetCoverage URL for the given measurements on one date.
    #[allow(clippy::too_many_arguments)]
    pub fn build_url(
        &self,
        collection: &str,
        assets: &[String],
        date: NaiveDate,
        bbox: &BoundingBox,
        crs: CrsCode,
        res_x: f64,
        res_y: f64,
    ) -> String {
        let mut url = self.endpoint.clone();
        url.push_str("&VERSION=1.0.0");
        url.push_str("&REQUEST=GetCoverage");
        url.push_str(&format!("&COVERAGE={}", collection));
        url.push_str(&format!("&TIME={}", date.format(DATE_FORMAT)));
        url.push_str(&format!("&MEASUREMENTS={}", assets.join(",")));
        url.push_str(&format!("&BBOX={}", bbox.to_query_string()));
        url.push_str(&format!("&CRS={}", crs));
        url.push_str(&format!("&RESX={}", res_x));
        url.push_str(&format!("&RESY={}", res_y));
        url.push_str("&FORMAT=GeoTIFF");
        url
    }

    /// URL requesting only the fmask classification band.
    pub fn mask_url(
        &self,
        collection: &str,
        date: NaiveDate,
        bbox: &BoundingBox,
        crs: CrsCode,
        resolution: (f64, f64),
    ) -> String {
        let assets = [FMASK_ASSET.to_string()];
        self.build_url(collection, &assets, date, bbox, crs, resolution.0, resolution.1)
    }

    /// URL requesting the user's assets, with the fmask band appended.
    pub fn full_url(
        &self,
        collection: &str,
        assets: &[String],
        date: NaiveDate,
        bbox: &BoundingBox,
        crs: CrsCode,
        resolution: (f64, f64),
    ) -> String {
        let assets = with_mask(assets);
        self.build_url(collection, &assets, date, bbox, crs, resolution.0, resolution.1)
    }
}

/// The measurement list with `oa_fmask` appended if absent.
pub fn with_mask(assets: &[String]) -> Vec<String> {
    let mut assets = assets.to_vec();
    if !assets.iter().any(|a| a == FMASK_ASSET) {
        assets.push(FMASK_ASSET.to_string());
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 7, 9).unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(1540000.0, -3970000.0, 1560000.0, -3950000.0, CrsCode::Epsg3577)
    }

    #[test]
    fn test_build_url_exact() {
        let builder = CoverageRequestBuilder::default();
        let url = builder.build_url(
            "ga_ls8c_ard_3",
            &["nbart_red".to_string(), "nbart_nir".to_string()],
            date(),
            &bbox(),
            CrsCode::Epsg3577,
            30.0,
            30.0,
        );

        assert_eq!(
            url,
            "https://ows.dea.ga.gov.au/wcs?service=WCS&VERSION=1.0.0&REQUEST=GetCoverage\
             &COVERAGE=ga_ls8c_ard_3&TIME=2021-07-09&MEASUREMENTS=nbart_red,nbart_nir\
             &BBOX=1540000,-3970000,1560000,-3950000&CRS=EPSG:3577&RESX=30&RESY=30&FORMAT=GeoTIFF"
        );
    }

    #[test]
    fn test_mask_and_full_urls() {
        let builder = CoverageRequestBuilder::new("http://localhost:8080/wcs");
        assert_eq!(builder.endpoint(), "http://localhost:8080/wcs?service=WCS");

        let mask = builder.mask_url("c", date(), &bbox(), CrsCode::Epsg3577, (30.0, 30.0));
        assert!(mask.contains("&MEASUREMENTS=oa_fmask&"));

        let full = builder.full_url(
            "c",
            &["nbart_red".to_string()],
            date(),
            &bbox(),
            CrsCode::Epsg3577,
            (30.0, 30.0),
        );
        assert!(full.contains("&MEASUREMENTS=nbart_red,oa_fmask&"));
    }

    #[test]
    fn test_with_mask_does_not_duplicate() {
        let assets = vec!["oa_fmask".to_string(), "nbart_red".to_string()];
        assert_eq!(with_mask(&assets), assets);
    }
}
