//! Band vocabulary: surface reflectance assets and the fmask quality band.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset name of the fmask classification band.
pub const FMASK_ASSET: &str = "oa_fmask";

/// The role a band plays in masking and index math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandRole {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Mask,
}

impl BandRole {
    pub const ALL: [BandRole; 7] = [
        BandRole::Blue,
        BandRole::Green,
        BandRole::Red,
        BandRole::Nir,
        BandRole::Swir1,
        BandRole::Swir2,
        BandRole::Mask,
    ];

    /// Asset (measurement) name in the ARD collections.
    pub fn asset_name(&self) -> &'static str {
        match self {
            BandRole::Blue => "nbart_blue",
            BandRole::Green => "nbart_green",
            BandRole::Red => "nbart_red",
            BandRole::Nir => "nbart_nir",
            BandRole::Swir1 => "nbart_swir_1",
            BandRole::Swir2 => "nbart_swir_2",
            BandRole::Mask => FMASK_ASSET,
        }
    }

    pub fn from_asset_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.asset_name() == name)
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            BandRole::Blue => "Blue",
            BandRole::Green => "Green",
            BandRole::Red => "Red",
            BandRole::Nir => "NIR",
            BandRole::Swir1 => "SWIR 1",
            BandRole::Swir2 => "SWIR 2",
            BandRole::Mask => "Fmask",
        }
    }
}

/// Fmask pixel classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FmaskClass {
    /// Outside the scene footprint
    Unclassified = 0,
    Clear = 1,
    Cloud = 2,
    CloudShadow = 3,
    Snow = 4,
    Water = 5,
}

impl FmaskClass {
    pub const ALL: [FmaskClass; 6] = [
        FmaskClass::Unclassified,
        FmaskClass::Clear,
        FmaskClass::Cloud,
        FmaskClass::CloudShadow,
        FmaskClass::Snow,
        FmaskClass::Water,
    ];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            FmaskClass::Unclassified => "Unclassified",
            FmaskClass::Clear => "Clear",
            FmaskClass::Cloud => "Cloud",
            FmaskClass::CloudShadow => "Cloud Shadow",
            FmaskClass::Snow => "Snow",
            FmaskClass::Water => "Water",
        }
    }
}

/// Set of classification values considered valid.
///
/// Backed by a 256-bit set so per-pixel membership is a shift and a mask.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct ValidClasses {
    bits: [u64; 4],
}

impl ValidClasses {
    pub fn new(values: &[u8]) -> Self {
        let mut bits = [0u64; 4];
        for &v in values {
            bits[(v >> 6) as usize] |= 1u64 << (v & 63);
        }
        Self { bits }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.bits[(value >> 6) as usize] & (1u64 << (value & 63)) != 0
    }

    /// Membership test for a decoded pixel; non-integral or out of range values are never valid.
    pub fn contains_pixel(&self, value: f32) -> bool {
        if !(0.0..=255.0).contains(&value) || value.fract() != 0.0 {
            return false;
        }
        self.contains(value as u8)
    }

    pub fn values(&self) -> Vec<u8> {
        (0..=255u8).filter(|v| self.contains(*v)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }
}

impl Default for ValidClasses {
    /// Clear, Snow and Water.
    fn default() -> Self {
        Self::new(&[
            FmaskClass::Clear.value(),
            FmaskClass::Snow.value(),
            FmaskClass::Water.value(),
        ])
    }
}

impl From<Vec<u8>> for ValidClasses {
    fn from(values: Vec<u8>) -> Self {
        Self::new(&values)
    }
}

impl From<ValidClasses> for Vec<u8> {
    fn from(classes: ValidClasses) -> Self {
        classes.values()
    }
}

impl fmt::Debug for ValidClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_name_round_trip() {
        for role in BandRole::ALL {
            assert_eq!(BandRole::from_asset_name(role.asset_name()), Some(role));
        }
        assert_eq!(BandRole::from_asset_name("nbart_coastal_aerosol"), None);
    }

    #[test]
    fn test_default_valid_classes() {
        let classes = ValidClasses::default();
        assert_eq!(classes.values(), vec![1, 4, 5]);
        assert!(classes.contains_pixel(1.0));
        assert!(!classes.contains_pixel(2.0));
        assert!(!classes.contains_pixel(1.5));
        assert!(!classes.contains_pixel(-1.0));
        assert!(!classes.contains_pixel(f32::NAN));
    }

    #[test]
    fn test_high_class_values() {
        let classes = ValidClasses::new(&[0, 64, 255]);
        assert!(classes.contains(0));
        assert!(classes.contains(64));
        assert!(classes.contains(255));
        assert!(!classes.contains(63));
    }

    #[test]
    fn test_fmask_labels() {
        assert_eq!(FmaskClass::from_value(3).map(|c| c.label()), Some("Cloud Shadow"));
        assert_eq!(FmaskClass::from_value(6), None);
    }
}
