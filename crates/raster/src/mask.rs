//! Masking of invalid pixels across reflectance bands.

use rayon::prelude::*;
use tracing::debug;

use scene_common::{BandRole, SceneResult, ValidClasses};

use crate::tile::RasterTile;

/// Set every non-classification sample to `nodata` where the fmask class is
/// not in `classes`.
///
/// Valid pixels keep their values. When `drop_mask` is set the fmask band is
/// removed from the output.
pub fn mask_invalid(
    tile: &RasterTile,
    classes: &ValidClasses,
    nodata: f32,
    drop_mask: bool,
) -> SceneResult<RasterTile> {
    let mask_index = tile.band_map().require(BandRole::Mask)?;
    let invalid: Vec<bool> = tile.bands[mask_index]
        .data
        .iter()
        .map(|&v| !classes.contains_pixel(v))
        .collect();

    let mut out = tile.clone();
    out.bands
        .par_iter_mut()
        .enumerate()
        .filter(|(i, _)| *i != mask_index)
        .for_each(|(_, band)| {
            for (sample, &bad) in band.data.iter_mut().zip(&invalid) {
                if bad {
                    *sample = nodata;
                }
            }
        });

    if drop_mask {
        out.bands.remove(mask_index);
    }
    out.nodata = Some(nodata as f64);

    debug!(
        invalid = invalid.iter().filter(|b| **b).count(),
        pixels = invalid.len(),
        "Masked invalid pixels"
    );

    Ok(out)
}
