//! # Cropmask Core
//!
//! Core types and I/O for the crop mask prediction pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform`: affine transformation for georeferencing
//! - `Crs`: coordinate reference system handling
//! - `GeoBox` / `Tile` / `Period`: the spatial and temporal unit of work
//! - `FeatureStack`: named multi-band model input aligned on one grid
//! - Native GeoTIFF reading/writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod stack;
pub mod tile;

pub use crs::Crs;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use stack::FeatureStack;
pub use tile::{GeoBox, Period, Semester, Tile};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::stack::FeatureStack;
    pub use crate::tile::{GeoBox, Period, Semester, Tile};
}
