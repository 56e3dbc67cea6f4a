//! Fmask-based scene validity assessment.

use serde::Serialize;

use scene_common::{BandRole, FmaskClass, SceneResult, ValidClasses};

use crate::tile::RasterTile;

/// Pixel counts and ratios for one mask band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidityStats {
    pub total: usize,
    pub overlap: usize,
    pub valid: usize,
    /// valid / (total - overlap)
    pub pct_valid: f64,
    /// overlap / total
    pub pct_overlap: f64,
}

/// Minimum share of valid pixels a scene needs to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityThreshold {
    pub min_valid: f64,
}

impl ValidityThreshold {
    /// Threshold from a maximum cloud cover percentage (0..=100).
    pub fn from_cloud_cover(max_cloud_pct: f64) -> Self {
        Self {
            min_valid: (100.0 - max_cloud_pct) / 100.0,
        }
    }

    pub fn judge(&self, stats: ValidityStats) -> ValidityVerdict {
        let keep = stats.pct_overlap < 1.0 && stats.pct_valid >= self.min_valid;
        ValidityVerdict { stats, keep }
    }
}

/// Outcome of assessing one scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidityVerdict {
    pub stats: ValidityStats,
    pub keep: bool,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    let value = numerator as f64 / denominator as f64;
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Count valid and overlap pixels in a classification band.
pub fn assess(mask: &[f32], classes: &ValidClasses) -> ValidityStats {
    let overlap_value = FmaskClass::Unclassified.value() as f32;

    let (overlap, valid) = mask.iter().fold((0usize, 0usize), |(overlap, valid), &v| {
        if v == overlap_value {
            (overlap + 1, valid)
        } else if classes.contains_pixel(v) {
            (overlap, valid + 1)
        } else {
            (overlap, valid)
        }
    });
    let total = mask.len();

    ValidityStats {
        total,
        overlap,
        valid,
        pct_valid: ratio(valid, total - overlap),
        pct_overlap: ratio(overlap, total),
    }
}

/// Assess the tile's fmask band.
///
/// A tile without a mask band is a processing error rather than an
/// invalid scene.
pub fn assess_tile(tile: &RasterTile, classes: &ValidClasses) -> SceneResult<ValidityStats> {
    let index = tile.band_map().require(BandRole::Mask)?;
    Ok(assess(&tile.bands[index].data, classes))
}
