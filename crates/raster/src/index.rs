//! Spectral vegetation indices.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scene_common::{BandRole, SceneError, SceneResult, ValidClasses};

use crate::tile::{Band, RasterTile};

/// Default output value for masked or undefined pixels.
pub const DEFAULT_NODATA: f32 = -999.0;

/// A derived index computed from surface reflectance bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    Ndvi,
    Evi,
    Lai,
    Msavi,
    Kndvi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 5] = [
        SpectralIndex::Evi,
        SpectralIndex::Lai,
        SpectralIndex::Msavi,
        SpectralIndex::Ndvi,
        SpectralIndex::Kndvi,
    ];

    /// Lowercase name, used for the output band.
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Evi => "evi",
            SpectralIndex::Lai => "lai",
            SpectralIndex::Msavi => "msavi",
            SpectralIndex::Kndvi => "kndvi",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "Normalised Difference Vegetation Index",
            SpectralIndex::Evi => "Enhanced Vegetation Index",
            SpectralIndex::Lai => "Leaf Area Index",
            SpectralIndex::Msavi => "Modified Soil Adjusted Vegetation Index",
            SpectralIndex::Kndvi => "Non-linear Normalised Difference Vegetation Index",
        }
    }

    pub fn required_roles(&self) -> &'static [BandRole] {
        match self {
            SpectralIndex::Evi | SpectralIndex::Lai => {
                &[BandRole::Blue, BandRole::Red, BandRole::Nir]
            }
            SpectralIndex::Msavi | SpectralIndex::Ndvi | SpectralIndex::Kndvi => {
                &[BandRole::Red, BandRole::Nir]
            }
        }
    }

    /// Asset names to request for this index, in request order.
    pub fn required_assets(&self) -> Vec<String> {
        self.required_roles()
            .iter()
            .map(|r| r.asset_name().to_string())
            .collect()
    }

    /// Evaluate the formula for one pixel. `blue` is ignored by indices
    /// that do not need it.
    fn evaluate(&self, blue: f64, red: f64, nir: f64) -> f64 {
        match self {
            SpectralIndex::Ndvi => (nir - red) / (nir + red),
            SpectralIndex::Evi => evi(blue, red, nir),
            SpectralIndex::Lai => 3.618 * evi(blue, red, nir) - 0.118,
            SpectralIndex::Msavi => {
                let a = 2.0 * nir + 1.0;
                (a - (a * a - 8.0 * (nir - red)).sqrt()) / 2.0
            }
            SpectralIndex::Kndvi => {
                let ndvi = (nir - red) / (nir + red);
                (ndvi * ndvi).tanh()
            }
        }
    }
}

fn evi(blue: f64, red: f64, nir: f64) -> f64 {
    2.5 * (nir - red) / (nir + 6.0 * red - 7.5 * blue + 1.0)
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|index| index.name() == lower)
            .ok_or_else(|| SceneError::InvalidConfig(format!("unknown index: {}", s)))
    }
}

/// What to do with NaN or infinite index values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Write the value as computed
    Keep,
    /// Replace with nodata
    #[default]
    ToNoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub nodata: f32,
    pub valid_classes: ValidClasses,
    pub non_finite: NonFinitePolicy,
    /// Append the fmask band to the output
    pub keep_mask: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            nodata: DEFAULT_NODATA,
            valid_classes: ValidClasses::default(),
            non_finite: NonFinitePolicy::default(),
            keep_mask: false,
        }
    }
}

/// Compute `index` over a tile, producing a single float32 band.
///
/// Pixels with an invalid fmask class or any negative input become nodata.
pub fn compute_index(
    tile: &RasterTile,
    index: SpectralIndex,
    options: &IndexOptions,
) -> SceneResult<RasterTile> {
    let map = tile.band_map();
    for role in index.required_roles() {
        map.require(*role)?;
    }
    let mask_index = map.require(BandRole::Mask)?;

    let mask = &tile.bands[mask_index].data;
    let red = &tile.bands[map.require(BandRole::Red)?].data;
    let nir = &tile.bands[map.require(BandRole::Nir)?].data;
    let blue = if index.required_roles().contains(&BandRole::Blue) {
        Some(tile.bands[map.require(BandRole::Blue)?].data.as_slice())
    } else {
        None
    };

    let nodata = options.nodata;
    let pixel = |i: usize| -> f32 {
        if !options.valid_classes.contains_pixel(mask[i]) {
            return nodata;
        }
        let b = blue.map(|b| b[i]).unwrap_or(0.0);
        let (r, n) = (red[i], nir[i]);
        if r < 0.0 || n < 0.0 || b < 0.0 {
            return nodata;
        }

        let value = index.evaluate(b as f64, r as f64, n as f64) as f32;
        match options.non_finite {
            NonFinitePolicy::ToNoData if !value.is_finite() => nodata,
            _ => value,
        }
    };

    let width = tile.width.max(1);
    let mut values = vec![nodata; tile.pixel_count()];
    values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let start = row * width;
            for (col, value) in out.iter_mut().enumerate() {
                *value = pixel(start + col);
            }
        });

    let mut bands = vec![Band::new(index.name(), values)];
    if options.keep_mask {
        bands.push(tile.bands[mask_index].clone());
    }

    debug!(index = %index, width = tile.width, height = tile.height, "Computed index");

    let mut out = RasterTile::new(tile.width, tile.height, bands)?
        .with_transform(tile.transform)
        .with_nodata(nodata as f64);
    out.epsg = tile.epsg;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    fn tile(blue: f32, red: f32, nir: f32, mask: f32) -> RasterTile {
        RasterTile::new(
            1,
            1,
            vec![
                Band::new("nbart_blue", vec![blue]),
                Band::new("nbart_red", vec![red]),
                Band::new("nbart_nir", vec![nir]),
                Band::new("oa_fmask", vec![mask]),
            ],
        )
        .unwrap()
        .with_epsg(3577)
    }

    fn single(tile: &RasterTile, index: SpectralIndex) -> f32 {
        compute_index(tile, index, &IndexOptions::default()).unwrap().bands[0].data[0]
    }

    #[test]
    fn test_ndvi_value() {
        let out = compute_index(
            &tile(500.0, 2000.0, 4000.0, 1.0),
            SpectralIndex::Ndvi,
            &IndexOptions::default(),
        )
        .unwrap();

        assert_eq!(out.band_names(), vec![Some("ndvi")]);
        assert_eq!(out.nodata, Some(-999.0));
        assert_eq!(out.epsg, Some(3577));
        assert_approx_eq!(out.bands[0].data[0], 1.0 / 3.0, 1e-6);
    }

    #[test]
    fn test_other_formulas() {
        let t = tile(500.0, 2000.0, 4000.0, 1.0);

        let evi = 2.5 * 2000.0 / (4000.0 + 12000.0 - 3750.0 + 1.0);
        assert_approx_eq!(single(&t, SpectralIndex::Evi), evi, 1e-6);
        assert_approx_eq!(single(&t, SpectralIndex::Lai), 3.618 * evi - 0.118, 1e-5);
        assert_approx_eq!(
            single(&t, SpectralIndex::Kndvi),
            ((1.0f64 / 9.0).tanh()),
            1e-6
        );

        let a: f64 = 8001.0;
        let msavi = (a - (a * a - 8.0 * 2000.0).sqrt()) / 2.0;
        assert_approx_eq!(single(&t, SpectralIndex::Msavi), msavi, 1e-3);
    }

    #[test]
    fn test_invalid_class_is_nodata() {
        assert_eq!(single(&tile(500.0, 2000.0, 4000.0, 2.0), SpectralIndex::Ndvi), -999.0);
    }

    #[test]
    fn test_negative_input_is_nodata() {
        assert_eq!(single(&tile(500.0, -1.0, 4000.0, 1.0), SpectralIndex::Ndvi), -999.0);
        // blue only matters for indices that use it
        assert_eq!(single(&tile(-5.0, 2000.0, 4000.0, 1.0), SpectralIndex::Evi), -999.0);
        assert!(single(&tile(-5.0, 2000.0, 4000.0, 1.0), SpectralIndex::Ndvi) > 0.0);
    }

    #[test]
    fn test_non_finite_policy() {
        let t = tile(0.0, 0.0, 0.0, 1.0);
        assert_eq!(single(&t, SpectralIndex::Ndvi), -999.0);

        let keep = IndexOptions {
            non_finite: NonFinitePolicy::Keep,
            ..Default::default()
        };
        let out = compute_index(&t, SpectralIndex::Ndvi, &keep).unwrap();
        assert!(out.bands[0].data[0].is_nan());
    }

    #[test]
    fn test_missing_band_is_processing_error() {
        let t = RasterTile::new(
            1,
            1,
            vec![Band::new("nbart_red", vec![1.0]), Band::new("nbart_nir", vec![2.0]), Band::new("oa_fmask", vec![1.0])],
        )
        .unwrap();

        assert!(compute_index(&t, SpectralIndex::Ndvi, &IndexOptions::default()).is_ok());
        assert!(matches!(
            compute_index(&t, SpectralIndex::Evi, &IndexOptions::default()),
            Err(SceneError::Processing(_))
        ));
    }

    #[test]
    fn test_keep_mask_appends_fmask() {
        let options = IndexOptions {
            keep_mask: true,
            ..Default::default()
        };
        let out = compute_index(&tile(1.0, 2.0, 3.0, 1.0), SpectralIndex::Ndvi, &options).unwrap();
        assert_eq!(out.band_names(), vec![Some("ndvi"), Some("oa_fmask")]);
    }

    #[test]
    fn test_rows_are_processed_in_place() {
        let t = RasterTile::new(
            3,
            2,
            vec![
                Band::new("nbart_red", vec![1.0, 1.0, 1.0, 3.0, 3.0, 3.0]),
                Band::new("nbart_nir", vec![3.0, 3.0, 3.0, 1.0, 1.0, 1.0]),
                Band::new("oa_fmask", vec![1.0, 1.0, 2.0, 1.0, 1.0, 1.0]),
            ],
        )
        .unwrap();

        let out = compute_index(&t, SpectralIndex::Ndvi, &IndexOptions::default()).unwrap();
        assert_eq!(out.bands[0].data, vec![0.5, 0.5, -999.0, -0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_parse_and_required_assets() {
        assert_eq!("kNDVI".parse::<SpectralIndex>().unwrap(), SpectralIndex::Kndvi);
        assert!("ndwi".parse::<SpectralIndex>().is_err());
        assert_eq!(
            SpectralIndex::Lai.required_assets(),
            vec!["nbart_blue", "nbart_red", "nbart_nir"]
        );
    }
}
