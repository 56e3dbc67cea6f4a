//! In-memory raster tiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use scene_common::{BandRole, SceneError, SceneResult};

/// Affine georeferencing for a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// World coordinates of a pixel's upper-left corner.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// One band of samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: Option<String>,
    pub data: Vec<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: Some(name.into()),
            data,
        }
    }

    pub fn unnamed(data: Vec<f32>) -> Self {
        Self { name: None, data }
    }
}

/// A decoded coverage: equally sized float32 bands plus georeferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Band>,
    pub transform: GeoTransform,
    pub epsg: Option<u32>,
    pub nodata: Option<f64>,
}

impl RasterTile {
    /// Create a tile, rejecting bands whose length is not `width * height`.
    pub fn new(width: usize, height: usize, bands: Vec<Band>) -> SceneResult<Self> {
        let expected = width * height;
        if let Some((i, band)) = bands
            .iter()
            .enumerate()
            .find(|(_, b)| b.data.len() != expected)
        {
            return Err(SceneError::Decode(format!(
                "band {} has {} samples, expected {} ({}x{})",
                i,
                band.data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            bands,
            transform: GeoTransform::default(),
            epsg: None,
            nodata: None,
        })
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_epsg(mut self, epsg: u32) -> Self {
        self.epsg = Some(epsg);
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<Option<&str>> {
        self.bands.iter().map(|b| b.name.as_deref()).collect()
    }

    /// Name unnamed bands from the requested measurement order.
    ///
    /// Only applies when the counts match; otherwise the tile is unchanged.
    pub fn label_bands(&mut self, assets: &[String]) {
        if assets.len() != self.bands.len() {
            return;
        }
        for (band, asset) in self.bands.iter_mut().zip(assets) {
            if band.name.is_none() {
                band.name = Some(asset.clone());
            }
        }
    }

    pub fn band_map(&self) -> BandMap {
        BandMap::from_tile(self)
    }
}

/// Which band index plays which role in a tile.
///
/// Built once per tile from the band names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandMap {
    roles: BTreeMap<BandRole, usize>,
}

impl BandMap {
    pub fn from_tile(tile: &RasterTile) -> Self {
        let roles = tile
            .bands
            .iter()
            .enumerate()
            .filter_map(|(i, band)| {
                band.name
                    .as_deref()
                    .and_then(BandRole::from_asset_name)
                    .map(|role| (role, i))
            })
            .collect();
        Self { roles }
    }

    pub fn get(&self, role: BandRole) -> Option<usize> {
        self.roles.get(&role).copied()
    }

    /// Index of a role, or a processing error naming the missing band.
    pub fn require(&self, role: BandRole) -> SceneResult<usize> {
        self.get(role).ok_or_else(|| {
            SceneError::Processing(format!("missing required band {}", role.asset_name()))
        })
    }

    pub fn mask(&self) -> Option<usize> {
        self.get(BandRole::Mask)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
