//! Normalized difference vegetation index.

use greenspace_raster::Raster;
use rayon::prelude::*;

use crate::ImageryError;

/// No-data value of index rasters.
pub const INDEX_NODATA: f32 = -9999.0;

/// Computes `(nir - red) / (nir + red)` per pixel.
///
/// A pixel is no-data ([`INDEX_NODATA`]) when either band is no-data, when
/// either reflectance is negative, or when both are zero. Every other
/// pixel falls in `[-1, 1]`.
///
/// # Errors
///
/// Returns [`ImageryError::Raster`] if the bands are on different grids.
pub fn normalized_difference(
    nir: &Raster<f32>,
    red: &Raster<f32>,
) -> Result<Raster<f32>, ImageryError> {
    nir.ensure_same_grid(red)?;

    let mut index = Raster::empty(*nir.grid(), INDEX_NODATA);
    let (nir_data, red_data) = (nir.data(), red.data());
    index
        .data_mut()
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, ndvi)| {
            let (n, r) = (nir_data[i], red_data[i]);
            if nir.is_nodata(n) || red.is_nodata(r) || n < 0.0 || r < 0.0 {
                return;
            }
            let sum = n + r;
            if sum > 0.0 {
                *ndvi = (n - r) / sum;
            }
        });

    log::debug!(
        "Index has {} valid of {} pixels",
        index.count_valid(),
        index.grid().len()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use greenspace_raster::{Crs, GeoTransform, GridSpec};

    fn grid(cols: usize) -> GridSpec {
        GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 30.0, 30.0, -30.0).unwrap(),
            1,
            cols,
        )
    }

    #[test]
    fn computes_normalized_difference() {
        let nir = Raster::from_vec(grid(3), vec![0.5, 0.2, 0.3]).unwrap();
        let red = Raster::from_vec(grid(3), vec![0.1, 0.2, 0.0]).unwrap();
        let ndvi = normalized_difference(&nir, &red).unwrap();
        assert_relative_eq!(ndvi.value(0, 0).unwrap(), 0.4 / 0.6, epsilon = 1e-6);
        assert_relative_eq!(ndvi.value(0, 1).unwrap(), 0.0);
        assert_relative_eq!(ndvi.value(0, 2).unwrap(), 1.0);
    }

    #[test]
    fn zero_sum_is_nodata_not_nan() {
        let nir = Raster::from_vec(grid(1), vec![0.0]).unwrap();
        let red = Raster::from_vec(grid(1), vec![0.0]).unwrap();
        let ndvi = normalized_difference(&nir, &red).unwrap();
        assert_eq!(ndvi.get(0, 0), Some(INDEX_NODATA));
        assert_eq!(ndvi.value(0, 0), None);
    }

    #[test]
    fn missing_or_negative_inputs_are_nodata() {
        let nir = Raster::from_vec(grid(3), vec![f32::NAN, 0.4, -0.01])
            .unwrap()
            .with_nodata(f32::NAN);
        let red = Raster::from_vec(grid(3), vec![0.1, f32::NAN, 0.1])
            .unwrap()
            .with_nodata(f32::NAN);
        let ndvi = normalized_difference(&nir, &red).unwrap();
        assert_eq!(ndvi.count_valid(), 0);
        assert!(ndvi.data().iter().all(|v| *v == INDEX_NODATA));
    }

    #[test]
    fn mismatched_grids_fail() {
        let nir = Raster::from_vec(grid(2), vec![0.5, 0.5]).unwrap();
        let red = Raster::from_vec(grid(1), vec![0.1]).unwrap();
        assert!(normalized_difference(&nir, &red).is_err());
    }
}
