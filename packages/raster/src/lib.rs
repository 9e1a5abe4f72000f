#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Georeferenced raster grids for the green space pipeline.
//!
//! A [`Raster`] is a row-major grid of cells on a [`GridSpec`] (CRS,
//! north-up affine transform, dimensions) with an optional explicit
//! no-data value. Every derived product of the pipeline (composite bands,
//! the vegetation index, green masks, the land-use raster, and per-pixel
//! ground area) is a `Raster` on the same working grid, so stage
//! boundaries reduce to grid equality checks.

pub mod crs;
pub mod grid;
pub mod io;
pub mod pixel_area;
pub mod raster;
pub mod transform;

use thiserror::Error;

pub use crs::Crs;
pub use grid::{GridSpec, Window};
pub use pixel_area::pixel_area;
pub use io::read_band;
pub use raster::{Raster, RasterElement, ensure_same_grid};
pub use transform::GeoTransform;

/// Errors that can occur during raster operations.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading a band file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding failed.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Cell buffer does not match the grid dimensions.
    #[error("Dimension mismatch: expected {expected_rows}x{expected_cols}, found {rows}x{cols}")]
    DimensionMismatch {
        /// Rows required by the grid.
        expected_rows: usize,
        /// Columns required by the grid.
        expected_cols: usize,
        /// Rows found.
        rows: usize,
        /// Columns found.
        cols: usize,
    },

    /// Two rasters that must share a grid do not.
    #[error("Grid mismatch: {message}")]
    GridMismatch {
        /// Description of the difference.
        message: String,
    },

    /// A band file uses a sample type that cannot be read as reflectance.
    #[error("Unsupported sample format in {path}")]
    UnsupportedSampleFormat {
        /// Path of the offending file.
        path: String,
    },

    /// A CRS identifier could not be parsed.
    #[error("Invalid CRS '{0}'")]
    InvalidCrs(String),

    /// A geotransform is degenerate.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),
}
