#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Vector layers and the raster/vector overlay of the pipeline.
//!
//! Loads census tracts, the study area, and land-use polygons from
//! `GeoJSON`, rasterizes land use onto the working grid, stacks per-pixel
//! green area with the land-use band, and sums that area per tract and
//! land-use code. Tract lookups go through an R-tree over tract envelopes;
//! a pixel belongs to a polygon when its center lies strictly inside it.

pub mod accumulate;
pub mod features;
pub mod land_use;
pub mod tracts;
pub mod zonal;

use greenspace_raster::{RasterError, Window};
use thiserror::Error;

pub use accumulate::{AreaStack, accumulate};
pub use features::{VectorFeature, load_study_area, read_features};
pub use land_use::{LAND_USE_NODATA, LandUseLayer, LandUsePolygon, rasterize_land_use};
pub use tracts::{RejectedTract, TractFeature, TractIndex, TractLayer};
pub use zonal::{ZonalOptions, ZonalOutcome, aggregate};

/// Errors that can occur while reading layers or overlaying them.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// I/O error reading a layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The layer is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Raster grid error.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// A layer holds no usable polygon.
    #[error("Layer {layer} has no polygon features")]
    EmptyLayer {
        /// Layer name or path.
        layer: String,
    },

    /// A zonal tile could not be reduced.
    #[error("Tile at row {}, col {} ({}x{}) failed: {message}", .tile.row, .tile.col, .tile.rows, .tile.cols)]
    TileFailed {
        /// Failed tile.
        tile: Window,
        /// Failure description.
        message: String,
    },
}
