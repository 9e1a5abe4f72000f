//! Reading scene bands as floating-point reflectance.

use greenspace_raster::{Raster, read_band};

use crate::{ImageryError, SceneCatalog, SceneEntry};

/// Source of scene pixels.
///
/// Implementations return rasters on the scene's own grid. Fill pixels
/// must come back as no-data (NaN) so they never enter a composite.
pub trait SceneLoader: Send + Sync {
    /// Loads one band as reflectance.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError`] if the band is missing or cannot be read.
    fn load_band(&self, scene: &SceneEntry, band: &str) -> Result<Raster<f32>, ImageryError>;

    /// Loads the per-pixel cloud score band, if the scene has one.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError`] if the band exists but cannot be read.
    fn load_cloud(&self, scene: &SceneEntry) -> Result<Option<Raster<f32>>, ImageryError>;
}

/// Loads bands from the single-band TIFF files named in a catalog and
/// converts stored values with the catalog's scale and offset.
#[derive(Debug, Clone, Copy)]
pub struct TiffSceneLoader {
    scale: f64,
    offset: f64,
    fill_value: Option<f32>,
}

impl TiffSceneLoader {
    /// Creates a loader using the conversion declared by `catalog`.
    #[must_use]
    pub const fn new(catalog: &SceneCatalog) -> Self {
        Self {
            scale: catalog.reflectance_scale,
            offset: catalog.reflectance_offset,
            fill_value: catalog.fill_value,
        }
    }
}

impl SceneLoader for TiffSceneLoader {
    #[allow(clippy::cast_possible_truncation)]
    fn load_band(&self, scene: &SceneEntry, band: &str) -> Result<Raster<f32>, ImageryError> {
        let path = scene.band_path(band)?;
        let raw = read_band(path, &scene.grid()?)?;
        let fill = self.fill_value;
        let (scale, offset) = (self.scale, self.offset);
        Ok(raw.map(f32::NAN, |v| {
            if fill.is_some_and(|f| f == v) {
                f32::NAN
            } else {
                f64::from(v).mul_add(scale, offset) as f32
            }
        }))
    }

    fn load_cloud(&self, scene: &SceneEntry) -> Result<Option<Raster<f32>>, ImageryError> {
        let Some(path) = scene.cloud.as_deref() else {
            return Ok(None);
        };
        Ok(Some(read_band(path, &scene.grid()?)?))
    }
}
