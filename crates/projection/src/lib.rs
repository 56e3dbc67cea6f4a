//! Coordinate reference system transformations.
//!
//! Implements map projections from scratch without external dependencies.
//! Every supported CRS converts to and from WGS84 lon/lat; transforms
//! between two projected systems go through geographic coordinates.

pub mod albers;
pub mod mercator;
pub mod transform;
pub mod transverse_mercator;

pub use albers::AlbersEqualArea;
pub use mercator::WebMercator;
pub use transform::{reproject_bbox, reproject_bbox_epsg, reproject_point};
pub use transverse_mercator::TransverseMercator;
