//! Scene catalog loading and filtering.
//!
//! A catalog is a TOML file describing the scenes of one sensor
//! collection: acquisition date, georeferencing, and the single-band TIFF
//! file of every band. Relative paths are resolved against the catalog's
//! directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use geo::{Intersects, Rect};
use greenspace_models::ImageryProfile;
use greenspace_raster::{Crs, GeoTransform, GridSpec};
use serde::Deserialize;

use crate::ImageryError;

const fn default_scale() -> f64 {
    1.0
}

/// All scenes of one collection, as listed in a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneCatalog {
    /// Sensor collection identifier (e.g. `"LT05"`).
    pub collection: String,
    /// Multiplier converting stored values to reflectance.
    #[serde(default = "default_scale")]
    pub reflectance_scale: f64,
    /// Offset added after scaling.
    #[serde(default)]
    pub reflectance_offset: f64,
    /// Stored value marking fill pixels. Landsat products use `0`.
    #[serde(default)]
    pub fill_value: Option<f32>,
    /// Listed scenes.
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
}

/// One scene of a catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    /// Scene identifier (e.g. `"LT05_022031_19900712"`).
    pub id: String,
    /// Acquisition date.
    pub acquired: NaiveDate,
    /// CRS of the scene grid.
    pub crs: Crs,
    /// `[origin_x, pixel_width, origin_y, pixel_height]`.
    pub transform: [f64; 4],
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Band name to single-band TIFF path.
    pub bands: BTreeMap<String, PathBuf>,
    /// Optional per-pixel cloud score band (0–100).
    #[serde(default)]
    pub cloud: Option<PathBuf>,
    /// Optional scene-level cloud cover percentage.
    #[serde(default)]
    pub cloud_cover: Option<f64>,
}

impl SceneEntry {
    /// Grid of this scene.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError::Raster`] if the transform is degenerate.
    pub fn grid(&self) -> Result<GridSpec, ImageryError> {
        let transform = GeoTransform::from_array(self.transform)?;
        Ok(GridSpec::new(self.crs, transform, self.rows, self.cols))
    }

    /// Path of a band file.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError::MissingBand`] if the scene lacks `band`.
    pub fn band_path(&self, band: &str) -> Result<&Path, ImageryError> {
        self.bands
            .get(band)
            .map(PathBuf::as_path)
            .ok_or_else(|| ImageryError::MissingBand {
                scene: self.id.clone(),
                band: band.to_string(),
            })
    }
}

impl SceneCatalog {
    /// Parses a catalog, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError::Toml`] if the text is not a valid catalog.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ImageryError> {
        let mut catalog: Self = toml::from_str(text)?;
        for scene in &mut catalog.scenes {
            for path in scene.bands.values_mut() {
                *path = base_dir.join(&*path);
            }
            if let Some(cloud) = scene.cloud.as_mut() {
                *cloud = base_dir.join(&*cloud);
            }
        }
        Ok(catalog)
    }

    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ImageryError> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let catalog = Self::parse(&text, base_dir)?;
        log::debug!(
            "Loaded {} catalog from {} ({} scenes)",
            catalog.collection,
            path.display(),
            catalog.scenes.len()
        );
        Ok(catalog)
    }

    /// Finds a scene by identifier, regardless of date.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&SceneEntry> {
        self.scenes.iter().find(|s| s.id == id)
    }

    /// Scenes of the profile's collection acquired inside its window whose
    /// footprint intersects `region`, in catalog order.
    ///
    /// # Errors
    ///
    /// * [`ImageryError::CollectionMismatch`] if the catalog is for another sensor
    /// * [`ImageryError::Raster`] if a scene has a degenerate transform
    pub fn select(
        &self,
        profile: &ImageryProfile,
        region: &Rect<f64>,
    ) -> Result<Vec<&SceneEntry>, ImageryError> {
        self.ensure_collection(profile)?;

        let mut selected = Vec::new();
        for scene in &self.scenes {
            if !profile.in_window(scene.acquired) {
                continue;
            }
            if !scene.grid()?.bounds().intersects(region) {
                log::debug!("Scene {} does not intersect the region", scene.id);
                continue;
            }
            selected.push(scene);
        }
        Ok(selected)
    }

    /// Working grid: the reference scene's CRS and pixel size, snapped to
    /// its lattice and covering `extent`.
    ///
    /// # Errors
    ///
    /// * [`ImageryError::CollectionMismatch`] if the catalog is for another sensor
    /// * [`ImageryError::UnknownReferenceScene`] if the reference is not listed
    /// * [`ImageryError::Raster`] if its transform is degenerate
    pub fn working_grid(
        &self,
        profile: &ImageryProfile,
        extent: &Rect<f64>,
    ) -> Result<GridSpec, ImageryError> {
        self.ensure_collection(profile)?;
        let reference = self
            .find(&profile.reference_scene)
            .ok_or_else(|| ImageryError::UnknownReferenceScene(profile.reference_scene.clone()))?;
        let grid = reference.grid()?.aligned_extent(extent);
        log::debug!(
            "Working grid from {}: {} at {} m, {}x{}",
            reference.id,
            grid.crs,
            grid.nominal_scale(),
            grid.rows,
            grid.cols
        );
        Ok(grid)
    }

    fn ensure_collection(&self, profile: &ImageryProfile) -> Result<(), ImageryError> {
        if self.collection == profile.collection {
            Ok(())
        } else {
            Err(ImageryError::CollectionMismatch {
                expected: profile.collection.clone(),
                found: self.collection.clone(),
            })
        }
    }
}
