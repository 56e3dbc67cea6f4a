//! Raster codec abstraction.

use std::fs;
use std::path::Path;

use scene_common::SceneResult;

use crate::tile::RasterTile;

/// Decodes downloaded coverages and persists processed tiles.
///
/// Implementations are synchronous; callers run them on blocking threads.
pub trait RasterStore: Send + Sync {
    /// Decode an encoded raster held in memory.
    fn decode(&self, bytes: &[u8]) -> SceneResult<RasterTile>;

    /// Encode a tile into an in-memory buffer.
    fn encode(&self, tile: &RasterTile) -> SceneResult<Vec<u8>>;

    /// Write a tile to `path` via a `.partial` sibling renamed into place.
    fn write(&self, tile: &RasterTile, path: &Path) -> SceneResult<()> {
        let bytes = self.encode(tile)?;
        let partial = path.with_extension("partial");
        fs::write(&partial, &bytes)?;
        if let Err(e) = fs::rename(&partial, path) {
            fs::remove_file(&partial).ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Read a tile from `path`.
    fn read(&self, path: &Path) -> SceneResult<RasterTile> {
        let bytes = fs::read(path)?;
        self.decode(&bytes)
    }
}
