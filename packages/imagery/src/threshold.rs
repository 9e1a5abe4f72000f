//! Percentile cutoffs of the index inside the study area.
//!
//! Pixels are sampled on the working grid itself, so the distribution is
//! that of the native imagery pixels and never of a resampled copy. A
//! pixel belongs to the study area when its center lies inside or on the
//! boundary of the study-area polygons.

use geo::{Intersects, MultiPolygon, Point};
use greenspace_models::Percentile;
use greenspace_raster::Raster;
use rayon::prelude::*;

use crate::ImageryError;

/// Default minimum number of valid pixels required to compute a cutoff.
pub const DEFAULT_MIN_SAMPLE_PIXELS: usize = 100;

/// Sorted valid index values inside the study area.
#[derive(Debug, Clone)]
pub struct ThresholdSampler {
    values: Vec<f64>,
    /// Study-area pixels whose index is no-data.
    pub missing_pixels: usize,
}

impl ThresholdSampler {
    /// Samples the valid `index` pixels whose centers fall inside `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError::InsufficientSample`] if fewer than
    /// `min_pixels` valid pixels are found.
    pub fn sample(
        index: &Raster<f32>,
        region: &MultiPolygon<f64>,
        min_pixels: usize,
    ) -> Result<Self, ImageryError> {
        let grid = index.grid();
        let Some(window) = geo::BoundingRect::bounding_rect(region)
            .and_then(|rect| grid.window_for(&rect))
        else {
            return Self::from_values(Vec::new(), min_pixels);
        };

        let per_row: Vec<(Vec<f64>, usize)> = (window.row..window.end_row())
            .into_par_iter()
            .map(|row| {
                let mut values = Vec::new();
                let mut missing = 0;
                for col in window.col..window.end_col() {
                    let (x, y) = grid.transform.pixel_center(row, col);
                    if !region.intersects(&Point::new(x, y)) {
                        continue;
                    }
                    match index.value(row, col) {
                        Some(v) => values.push(f64::from(v)),
                        None => missing += 1,
                    }
                }
                (values, missing)
            })
            .collect();

        let missing_pixels = per_row.iter().map(|(_, m)| m).sum();
        let values = per_row.into_iter().flat_map(|(v, _)| v).collect();
        let mut sampler = Self::from_values(values, min_pixels)?;
        sampler.missing_pixels = missing_pixels;
        Ok(sampler)
    }

    /// Builds a sampler from raw values, dropping non-finite ones.
    ///
    /// # Errors
    ///
    /// Returns [`ImageryError::InsufficientSample`] if fewer than
    /// `min_pixels` finite values remain, or if none remain at all.
    pub fn from_values(mut values: Vec<f64>, min_pixels: usize) -> Result<Self, ImageryError> {
        values.retain(|v| v.is_finite());
        if values.is_empty() || values.len() < min_pixels {
            return Err(ImageryError::InsufficientSample {
                valid: values.len(),
                required: min_pixels.max(1),
            });
        }
        values.sort_by(f64::total_cmp);
        Ok(Self {
            values,
            missing_pixels: 0,
        })
    }

    /// Number of sampled pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: construction fails on an empty sample.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index value at percentile `p`, interpolating linearly between the
    /// order statistics around rank `p/100 * (n - 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn threshold(&self, p: Percentile) -> f64 {
        let last = self.values.len() - 1;
        let rank = p.fraction() * last as f64;
        let lo = rank.floor() as usize;
        let hi = (lo + 1).min(last);
        let frac = rank - lo as f64;
        let (a, b) = (self.values[lo], self.values[hi]);
        if frac == 0.0 { a } else { (b - a).mul_add(frac, a) }
    }

    /// Cutoffs for several percentiles, in the given order.
    #[must_use]
    pub fn thresholds(&self, percentiles: &[Percentile]) -> Vec<(Percentile, f64)> {
        percentiles.iter().map(|p| (*p, self.threshold(*p))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Rect, coord};
    use greenspace_raster::{Crs, GeoTransform, GridSpec};

    fn p(value: u8) -> Percentile {
        Percentile::new(value).unwrap()
    }

    #[test]
    fn interpolates_between_order_statistics() {
        let sampler = ThresholdSampler::from_values(vec![0.9, 0.1, 0.6, 0.3], 1).unwrap();
        // rank = 0.75 * 3 = 2.25, between 0.6 and 0.9
        assert_relative_eq!(sampler.threshold(p(75)), 0.675, epsilon = 1e-12);
        assert_relative_eq!(sampler.threshold(p(0)), 0.1);
        assert_relative_eq!(sampler.threshold(p(100)), 0.9);
        assert_relative_eq!(sampler.threshold(p(50)), 0.45, epsilon = 1e-12);
    }

    #[test]
    fn thresholds_are_monotonic() {
        let values: Vec<f64> = (0..997).map(|i| ((i * 7919) % 1000) as f64 / 1000.0 - 0.3).collect();
        let sampler = ThresholdSampler::from_values(values, 1).unwrap();
        let cutoffs = sampler.thresholds(&Percentile::STANDARD);
        assert_eq!(cutoffs.len(), 5);
        for pair in cutoffs.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn single_value_sample() {
        let sampler = ThresholdSampler::from_values(vec![0.42], 1).unwrap();
        for (_, v) in sampler.thresholds(&Percentile::STANDARD) {
            assert_relative_eq!(v, 0.42);
        }
    }

    #[test]
    fn too_few_pixels_is_insufficient_sample() {
        assert!(matches!(
            ThresholdSampler::from_values(vec![0.1, 0.2], 3),
            Err(ImageryError::InsufficientSample {
                valid: 2,
                required: 3
            })
        ));
        assert!(matches!(
            ThresholdSampler::from_values(vec![f64::NAN], 0),
            Err(ImageryError::InsufficientSample { valid: 0, .. })
        ));
    }

    #[test]
    fn samples_only_pixels_inside_region() {
        let grid = GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        let index = Raster::from_vec(grid, vec![0.1, 0.3, -9999.0, 0.9])
            .unwrap()
            .with_nodata(-9999.0);
        // Left column only: centers (15, 45) and (15, 15).
        let region: MultiPolygon<f64> =
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 30.0, y: 60.0 })
                .to_polygon()
                .into();
        let sampler = ThresholdSampler::sample(&index, &region, 1).unwrap();
        assert_eq!(sampler.len(), 1);
        assert_eq!(sampler.missing_pixels, 1);
        assert_relative_eq!(sampler.threshold(p(90)), f64::from(0.1_f32));
    }

    #[test]
    fn centers_on_the_region_edge_are_sampled() {
        let grid = GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        let index = Raster::from_vec(grid, vec![0.1_f32, 0.3, 0.6, 0.9]).unwrap();
        // Right edge at x = 45 runs through the centers of column 1.
        let region: MultiPolygon<f64> =
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 45.0, y: 60.0 })
                .to_polygon()
                .into();
        let sampler = ThresholdSampler::sample(&index, &region, 1).unwrap();
        assert_eq!(sampler.len(), 4);
    }

    #[test]
    fn region_outside_grid_is_insufficient() {
        let grid = GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        let index = Raster::filled(grid, 0.5_f32);
        let region: MultiPolygon<f64> =
            Rect::new(coord! { x: 500.0, y: 500.0 }, coord! { x: 600.0, y: 600.0 })
                .to_polygon()
                .into();
        assert!(matches!(
            ThresholdSampler::sample(&index, &region, 1),
            Err(ImageryError::InsufficientSample { valid: 0, .. })
        ));
    }
}
