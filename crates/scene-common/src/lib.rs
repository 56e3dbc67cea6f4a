//! Common types and utilities shared across the scene pipeline crates.

pub mod band;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod time;

pub use band::{BandRole, FmaskClass, ValidClasses, FMASK_ASSET};
pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{SceneError, SceneResult};
pub use time::{solar_day, DateRange};
