//! Cloud-light per-pixel composite of a scene stack.
//!
//! Every in-window scene contributes one observation per working-grid
//! pixel it covers, provided all requested bands are valid there. Each
//! observation carries a cloud score: the pixel's value in the scene's
//! cloud band, else the scene-level cloud cover, else zero. Per pixel the
//! observations scoring within `cloud_score_range` of the least cloudy
//! one are kept, and each band takes the median of the kept values.

use std::collections::BTreeMap;

use greenspace_raster::{GridSpec, Raster};
use rayon::prelude::*;

use crate::{ImageryError, SceneEntry, SceneLoader};

/// Default width of the accepted cloud score band above the per-pixel
/// minimum.
pub const DEFAULT_CLOUD_SCORE_RANGE: f64 = 10.0;

/// One composite band per requested band name, on the working grid.
#[derive(Debug, Clone)]
pub struct Composite {
    bands: BTreeMap<String, Raster<f32>>,
    /// Scenes that contributed observations.
    pub scenes_used: Vec<String>,
    /// Working-grid pixels with at least one observation.
    pub covered_pixels: usize,
}

impl Composite {
    /// Composite band by name.
    #[must_use]
    pub fn band(&self, name: &str) -> Option<&Raster<f32>> {
        self.bands.get(name)
    }
}

/// A scene's bands placed on the working grid.
struct PlacedScene {
    row_offset: isize,
    col_offset: isize,
    bands: Vec<Raster<f32>>,
    cloud: Option<Raster<f32>>,
    cloud_cover: f64,
}

impl PlacedScene {
    /// Observation at a working-grid pixel, if the scene covers it with
    /// valid values in every band.
    fn observe(&self, row: usize, col: usize) -> Option<(f64, Vec<f32>)> {
        let r = usize::try_from(isize::try_from(row).ok()? + self.row_offset).ok()?;
        let c = usize::try_from(isize::try_from(col).ok()? + self.col_offset).ok()?;
        let values = self
            .bands
            .iter()
            .map(|band| band.value(r, c))
            .collect::<Option<Vec<f32>>>()?;
        let score = self
            .cloud
            .as_ref()
            .and_then(|cloud| cloud.value(r, c))
            .map_or(self.cloud_cover, f64::from);
        Some((score, values))
    }
}

/// Builds the composite of `scenes` on `grid` for `band_names`.
///
/// Scenes whose grid is not aligned with `grid` (other CRS, cell size, or
/// a sub-pixel offset) are skipped with a warning.
///
/// # Errors
///
/// * [`ImageryError::InsufficientImagery`] if no scene is usable or no pixel is covered
/// * [`ImageryError`] from the loader if a band cannot be read
pub fn build_composite(
    scenes: &[&SceneEntry],
    loader: &dyn SceneLoader,
    grid: &GridSpec,
    band_names: &[&str],
    cloud_score_range: f64,
) -> Result<Composite, ImageryError> {
    let mut placed = Vec::new();
    let mut scenes_used = Vec::new();

    for scene in scenes {
        let scene_grid = scene.grid()?;
        // Working pixel (r, c) is scene pixel (r + dr, c + dc).
        let Some((dr, dc)) = scene_grid.offset_of(grid) else {
            log::warn!(
                "Skipping scene {}: grid {} is not aligned with the working grid {}",
                scene.id,
                scene_grid.crs,
                grid.crs
            );
            continue;
        };

        let bands = band_names
            .iter()
            .map(|name| loader.load_band(scene, name))
            .collect::<Result<Vec<_>, _>>()?;
        let cloud = loader.load_cloud(scene)?;

        log::debug!("Compositing scene {} acquired {}", scene.id, scene.acquired);
        scenes_used.push(scene.id.clone());
        placed.push(PlacedScene {
            row_offset: dr,
            col_offset: dc,
            bands,
            cloud,
            cloud_cover: scene.cloud_cover.unwrap_or(0.0),
        });
    }

    if placed.is_empty() {
        return Err(ImageryError::InsufficientImagery {
            reason: format!("none of {} candidate scenes is usable", scenes.len()),
        });
    }

    let rows: Vec<Vec<Option<Vec<f32>>>> = (0..grid.rows)
        .into_par_iter()
        .map(|row| {
            (0..grid.cols)
                .map(|col| composite_pixel(&placed, row, col, cloud_score_range))
                .collect()
        })
        .collect();

    let mut bands: Vec<Raster<f32>> = band_names
        .iter()
        .map(|_| Raster::empty(*grid, f32::NAN))
        .collect();
    let mut covered_pixels = 0;
    for (row, pixels) in rows.into_iter().enumerate() {
        for (col, pixel) in pixels.into_iter().enumerate() {
            let Some(values) = pixel else { continue };
            covered_pixels += 1;
            for (band, value) in bands.iter_mut().zip(values) {
                band.set(row, col, value);
            }
        }
    }

    if covered_pixels == 0 {
        return Err(ImageryError::InsufficientImagery {
            reason: format!(
                "{} scenes used but no working-grid pixel has a valid observation",
                scenes_used.len()
            ),
        });
    }

    log::info!(
        "Composite of {} scenes covers {covered_pixels} of {} pixels",
        scenes_used.len(),
        grid.len()
    );

    Ok(Composite {
        bands: band_names
            .iter()
            .map(|name| (*name).to_string())
            .zip(bands)
            .collect(),
        scenes_used,
        covered_pixels,
    })
}

fn composite_pixel(
    scenes: &[PlacedScene],
    row: usize,
    col: usize,
    cloud_score_range: f64,
) -> Option<Vec<f32>> {
    let observations: Vec<(f64, Vec<f32>)> = scenes
        .iter()
        .filter_map(|scene| scene.observe(row, col))
        .collect();
    let min_score = observations
        .iter()
        .map(|(score, _)| *score)
        .min_by(f64::total_cmp)?;
    let kept: Vec<&Vec<f32>> = observations
        .iter()
        .filter(|(score, _)| *score <= min_score + cloud_score_range)
        .map(|(_, values)| values)
        .collect();

    let band_count = kept[0].len();
    Some(
        (0..band_count)
            .map(|b| median(kept.iter().map(|values| values[b]).collect()))
            .collect(),
    )
}

/// Median of a non-empty sample; the mean of the two middle values for
/// even counts.
fn median(mut values: Vec<f32>) -> f32 {
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use greenspace_raster::{Crs, GeoTransform};
    use std::collections::HashMap;

    /// Serves in-memory band values keyed by (scene, band).
    struct MemoryLoader {
        bands: HashMap<(String, String), Vec<f32>>,
        clouds: HashMap<String, Vec<f32>>,
    }

    impl SceneLoader for MemoryLoader {
        fn load_band(&self, scene: &SceneEntry, band: &str) -> Result<Raster<f32>, ImageryError> {
            let data = self
                .bands
                .get(&(scene.id.clone(), band.to_string()))
                .cloned()
                .ok_or_else(|| ImageryError::MissingBand {
                    scene: scene.id.clone(),
                    band: band.to_string(),
                })?;
            Ok(Raster::from_vec(scene.grid()?, data)?.with_nodata(f32::NAN))
        }

        fn load_cloud(&self, scene: &SceneEntry) -> Result<Option<Raster<f32>>, ImageryError> {
            let Some(data) = self.clouds.get(&scene.id) else {
                return Ok(None);
            };
            Ok(Some(Raster::from_vec(scene.grid()?, data.clone())?))
        }
    }

    fn scene(id: &str, origin_x: f64, cloud_cover: Option<f64>) -> SceneEntry {
        SceneEntry {
            id: id.to_string(),
            acquired: NaiveDate::from_ymd_opt(1990, 7, 1).unwrap(),
            crs: Crs::from_epsg(32616),
            transform: [origin_x, 30.0, 60.0, -30.0],
            rows: 2,
            cols: 2,
            bands: BTreeMap::new(),
            cloud: None,
            cloud_cover,
        }
    }

    fn working_grid() -> GridSpec {
        GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            2,
            2,
        )
    }

    fn loader(entries: &[(&str, &str, [f32; 4])]) -> MemoryLoader {
        MemoryLoader {
            bands: entries
                .iter()
                .map(|(s, b, v)| (((*s).to_string(), (*b).to_string()), v.to_vec()))
                .collect(),
            clouds: HashMap::new(),
        }
    }

    #[test]
    fn median_of_clear_observations() {
        let scenes = [
            scene("a", 0.0, Some(2.0)),
            scene("b", 0.0, Some(5.0)),
            scene("c", 0.0, Some(60.0)),
        ];
        let loader = loader(&[
            ("a", "B4", [0.1, 0.2, 0.3, 0.4]),
            ("b", "B4", [0.3, 0.4, 0.5, 0.6]),
            ("c", "B4", [0.9, 0.9, 0.9, 0.9]),
        ]);
        let refs: Vec<&SceneEntry> = scenes.iter().collect();
        let composite =
            build_composite(&refs, &loader, &working_grid(), &["B4"], DEFAULT_CLOUD_SCORE_RANGE)
                .unwrap();

        // The cloudy scene is outside min + 10 and never contributes.
        let band = composite.band("B4").unwrap();
        approx::assert_relative_eq!(band.value(0, 0).unwrap(), 0.2, epsilon = 1e-6);
        approx::assert_relative_eq!(band.value(1, 1).unwrap(), 0.5, epsilon = 1e-6);
        assert_eq!(composite.covered_pixels, 4);
    }

    #[test]
    fn pixel_cloud_band_overrides_scene_cover() {
        let scenes = [scene("a", 0.0, None), scene("b", 0.0, None)];
        let mut loader = loader(&[
            ("a", "B4", [0.1, 0.1, 0.1, 0.1]),
            ("b", "B4", [0.7, 0.7, 0.7, 0.7]),
        ]);
        loader
            .clouds
            .insert("a".to_string(), vec![90.0, 0.0, 0.0, 0.0]);
        let refs: Vec<&SceneEntry> = scenes.iter().collect();
        let composite =
            build_composite(&refs, &loader, &working_grid(), &["B4"], 10.0).unwrap();

        let band = composite.band("B4").unwrap();
        approx::assert_relative_eq!(band.value(0, 0).unwrap(), 0.7, epsilon = 1e-6);
        approx::assert_relative_eq!(band.value(0, 1).unwrap(), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn offset_scene_covers_part_of_grid() {
        let scenes = [scene("east", 30.0, None)];
        let loader = loader(&[("east", "B4", [0.5, 0.6, 0.7, 0.8])]);
        let refs: Vec<&SceneEntry> = scenes.iter().collect();
        let composite =
            build_composite(&refs, &loader, &working_grid(), &["B4"], 10.0).unwrap();

        let band = composite.band("B4").unwrap();
        assert_eq!(band.value(0, 0), None);
        approx::assert_relative_eq!(band.value(0, 1).unwrap(), 0.5, epsilon = 1e-6);
        approx::assert_relative_eq!(band.value(1, 1).unwrap(), 0.7, epsilon = 1e-6);
        assert_eq!(composite.covered_pixels, 2);
    }

    #[test]
    fn misaligned_scenes_are_skipped() {
        let scenes = [scene("half", 15.0, None)];
        let loader = loader(&[("half", "B4", [0.5; 4])]);
        let refs: Vec<&SceneEntry> = scenes.iter().collect();
        assert!(matches!(
            build_composite(&refs, &loader, &working_grid(), &["B4"], 10.0),
            Err(ImageryError::InsufficientImagery { .. })
        ));
    }

    #[test]
    fn no_scenes_is_insufficient_imagery() {
        let loader = loader(&[]);
        assert!(matches!(
            build_composite(&[], &loader, &working_grid(), &["B4"], 10.0),
            Err(ImageryError::InsufficientImagery { .. })
        ));
    }

    #[test]
    fn all_fill_is_insufficient_imagery() {
        let scenes = [scene("a", 0.0, None)];
        let loader = loader(&[("a", "B4", [f32::NAN; 4])]);
        let refs: Vec<&SceneEntry> = scenes.iter().collect();
        assert!(matches!(
            build_composite(&refs, &loader, &working_grid(), &["B4"], 10.0),
            Err(ImageryError::InsufficientImagery { .. })
        ));
    }

    #[test]
    fn even_median_is_midpoint() {
        assert!((median(vec![0.4, 0.2]) - 0.3).abs() < 1e-6);
        assert!((median(vec![0.5, 0.1, 0.3]) - 0.3).abs() < 1e-6);
    }
}
