//! Raster processing for downloaded coverages.
//!
//! A [`RasterTile`] holds decoded float32 bands. The validity assessor scores
//! a tile's fmask band, the band processor masks invalid pixels or derives a
//! spectral index, and a [`RasterStore`] moves tiles to and from GeoTIFF.

pub mod geotiff;
pub mod index;
pub mod mask;
pub mod store;
pub mod tile;
pub mod validity;

pub use geotiff::GeoTiffStore;
pub use index::{compute_index, IndexOptions, NonFinitePolicy, SpectralIndex};
pub use mask::mask_invalid;
pub use store::RasterStore;
pub use tile::{Band, BandMap, GeoTransform, RasterTile};
pub use validity::{assess, assess_tile, ValidityStats, ValidityThreshold, ValidityVerdict};
