//! Turn filtered features into per-date coverage downloads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use scene_common::time::{solar_day, DATE_FORMAT};
use scene_common::SceneResult;

use crate::coverage::{with_mask, CoverageRequestBuilder};
use crate::models::Feature;
use crate::query::QueryParameters;

/// Which coverage request a download stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// The fmask band alone, used for validity assessment
    Mask,
    /// The requested bands plus fmask
    Full,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Mask => "mask",
            Purpose::Full => "full",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scene date to fetch, with a URL per purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    pub id: String,
    pub date: NaiveDate,
    pub collection: String,
    pub urls: BTreeMap<Purpose, String>,
    /// Measurement order of the full request, fmask last
    pub assets: Vec<String>,
    pub file_name: String,
}

impl Download {
    pub fn url(&self, purpose: Purpose) -> Option<&str> {
        self.urls.get(&purpose).map(String::as_str)
    }

    /// Measurements expected back for a purpose.
    pub fn expected_assets(&self, purpose: Purpose) -> Vec<String> {
        match purpose {
            Purpose::Mask => vec![scene_common::FMASK_ASSET.to_string()],
            Purpose::Full => self.assets.clone(),
        }
    }
}

/// Build one download per feature.
///
/// Features are expected to be grouped by solar day already, so dates and
/// file names are unique.
pub fn plan_downloads(
    features: &[Feature],
    query: &QueryParameters,
    builder: &CoverageRequestBuilder,
) -> SceneResult<Vec<Download>> {
    let bbox = query.coverage_bbox()?;
    let assets = with_mask(&query.assets);

    let downloads = features
        .iter()
        .map(|feature| {
            let date = solar_day(&feature.datetime);
            let mut urls = BTreeMap::new();
            urls.insert(
                Purpose::Mask,
                builder.mask_url(&feature.collection, date, &bbox, query.output_crs, query.resolution),
            );
            urls.insert(
                Purpose::Full,
                builder.full_url(
                    &feature.collection,
                    &query.assets,
                    date,
                    &bbox,
                    query.output_crs,
                    query.resolution,
                ),
            );

            Download {
                id: feature.id.clone(),
                date,
                collection: feature.collection.clone(),
                urls,
                assets: assets.clone(),
                file_name: format!("{}.tif", date.format(DATE_FORMAT)),
            }
        })
        .collect();

    Ok(downloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_common::time::parse_datetime;
    use scene_common::{BoundingBox, DateRange};
    use std::collections::BTreeSet;

    #[test]
    fn test_plan_downloads() {
        let features = vec![Feature {
            id: "scene-1".to_string(),
            datetime: parse_datetime("2020-01-05T23:51:34Z").unwrap(),
            platform: "landsat-8".to_string(),
            collection: "ga_ls8c_ard_3".to_string(),
            bbox: None,
            footprint: Vec::new(),
            assets: BTreeSet::new(),
        }];
        let query = QueryParameters::new(
            BoundingBox::wgs84(149.0, -35.4, 149.2, -35.2),
            DateRange::parse("2020-01-01/2020-01-31").unwrap(),
        )
        .with_assets(vec!["nbart_red".to_string(), "nbart_nir".to_string()]);

        let downloads =
            plan_downloads(&features, &query, &CoverageRequestBuilder::default()).unwrap();
        assert_eq!(downloads.len(), 1);

        let download = &downloads[0];
        assert_eq!(download.file_name, "2020-01-05.tif");
        assert_eq!(download.assets, vec!["nbart_red", "nbart_nir", "oa_fmask"]);
        assert!(download.url(Purpose::Mask).unwrap().contains("MEASUREMENTS=oa_fmask&"));
        assert!(download
            .url(Purpose::Full)
            .unwrap()
            .contains("MEASUREMENTS=nbart_red,nbart_nir,oa_fmask&"));
        assert!(download.url(Purpose::Full).unwrap().contains("CRS=EPSG:3577"));
        assert_eq!(download.expected_assets(Purpose::Mask), vec!["oa_fmask"]);
    }
}
