#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! From satellite scenes to green masks.
//!
//! A year's scenes are listed in a [`catalog::SceneCatalog`]. The scenes
//! acquired inside the year's summer window are reduced to one cloud-light
//! [`composite::Composite`] on the working grid, the NIR and red bands of
//! the composite give the vegetation index ([`index::normalized_difference`]),
//! the index values inside the study area give the percentile cutoffs
//! ([`threshold::ThresholdSampler`]), and each cutoff turns the index into
//! a binary green mask ([`mask::green_mask`]).

pub mod catalog;
pub mod composite;
pub mod index;
pub mod mask;
pub mod scene;
pub mod threshold;

use greenspace_raster::RasterError;
use thiserror::Error;

pub use catalog::{SceneCatalog, SceneEntry};
pub use composite::{Composite, build_composite};
pub use index::{INDEX_NODATA, normalized_difference};
pub use mask::{MASK_NODATA, green_mask};
pub use scene::{SceneLoader, TiffSceneLoader};
pub use threshold::ThresholdSampler;

/// Errors that can occur while turning scenes into masks.
#[derive(Debug, Error)]
pub enum ImageryError {
    /// I/O error reading a catalog.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog TOML could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Raster read or grid error.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// No usable scene covers the window and region, or the composite
    /// holds no valid pixel.
    #[error("Insufficient imagery: {reason}")]
    InsufficientImagery {
        /// What was missing.
        reason: String,
    },

    /// Too few valid index pixels inside the study area to compute a
    /// percentile.
    #[error("Insufficient sample: {valid} valid pixels, at least {required} required")]
    InsufficientSample {
        /// Valid pixels found.
        valid: usize,
        /// Configured minimum.
        required: usize,
    },

    /// A scene does not provide a band the profile needs.
    #[error("Scene {scene} has no band '{band}'")]
    MissingBand {
        /// Scene identifier.
        scene: String,
        /// Band name.
        band: String,
    },

    /// The catalog lists scenes of another sensor collection.
    #[error("Catalog collection '{found}' does not match expected '{expected}'")]
    CollectionMismatch {
        /// Collection required by the year's imagery profile.
        expected: String,
        /// Collection declared by the catalog.
        found: String,
    },

    /// The reference scene is not in the catalog.
    #[error("Reference scene '{0}' not found in catalog")]
    UnknownReferenceScene(String),
}
