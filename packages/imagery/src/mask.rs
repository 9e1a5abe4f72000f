//! Binary green masks.

use greenspace_raster::Raster;

/// No-data value of mask rasters.
pub const MASK_NODATA: u8 = u8::MAX;

/// Marks pixels whose index is at or above `threshold` with `1`, others
/// with `0`. Index no-data stays no-data. No smoothing is applied.
#[must_use]
pub fn green_mask(index: &Raster<f32>, threshold: f64) -> Raster<u8> {
    index.map(MASK_NODATA, |v| u8::from(f64::from(v) >= threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{INDEX_NODATA, ThresholdSampler};
    use greenspace_models::Percentile;
    use greenspace_raster::{Crs, GeoTransform, GridSpec};

    fn two_by_two() -> Raster<f32> {
        let grid = GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        Raster::from_vec(grid, vec![0.1, 0.3, 0.6, 0.9]).unwrap()
    }

    #[test]
    fn keeps_pixels_at_or_above_threshold() {
        let mask = green_mask(&two_by_two(), f64::from(0.6_f32));
        assert_eq!(mask.data(), &[0, 0, 1, 1]);
    }

    #[test]
    fn p75_of_two_by_two_keeps_one_pixel() {
        let index = two_by_two();
        let sampler =
            ThresholdSampler::from_values(index.valid_values().map(f64::from).collect(), 1).unwrap();
        let cutoff = sampler.threshold(Percentile::STANDARD[1]);
        assert!(cutoff > f64::from(0.6_f32) && cutoff < f64::from(0.9_f32));
        assert_eq!(green_mask(&index, cutoff).data(), &[0, 0, 0, 1]);
    }

    #[test]
    fn nodata_index_stays_nodata() {
        let mut index = two_by_two().with_nodata(INDEX_NODATA);
        index.set(0, 0, INDEX_NODATA);
        let mask = green_mask(&index, -1.0);
        assert_eq!(mask.data(), &[MASK_NODATA, 1, 1, 1]);
        assert_eq!(mask.count_valid(), 3);
    }
}
