//! Error types for cropmask-core

use thiserror::Error;

/// Main error type for core raster operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Grid mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    GridMismatch {
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Band '{0}' already present in feature stack")]
    DuplicateBand(String),

    #[error("GeoTIFF error: {0}")]
    Geotiff(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
