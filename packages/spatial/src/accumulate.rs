//! Green area per pixel, stacked with the land-use band.

use greenspace_raster::Raster;

use crate::SpatialError;
use crate::land_use::LAND_USE_NODATA;

/// Two co-registered bands: green area (m²) and land-use code.
#[derive(Debug, Clone)]
pub struct AreaStack {
    /// Ground area of green pixels, `0.0` elsewhere.
    pub area: Raster<f64>,
    /// Land-use code, [`LAND_USE_NODATA`] where unclassified.
    pub land_use: Raster<u32>,
}

impl AreaStack {
    /// Total green area over the whole grid.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.area.data().iter().sum()
    }

    /// Green area on pixels without a land-use code.
    #[must_use]
    pub fn unclassified_area(&self) -> f64 {
        self.area
            .data()
            .iter()
            .zip(self.land_use.data())
            .filter(|(_, code)| **code == LAND_USE_NODATA)
            .map(|(area, _)| area)
            .sum()
    }
}

/// Multiplies the binary `mask` by `pixel_area` and stacks `land_use`
/// alongside. Mask no-data counts as not green.
///
/// # Errors
///
/// Returns [`SpatialError::Raster`] if the three rasters are not on the
/// same grid.
pub fn accumulate(
    mask: &Raster<u8>,
    pixel_area: &Raster<f64>,
    land_use: &Raster<u32>,
) -> Result<AreaStack, SpatialError> {
    mask.ensure_same_grid(pixel_area)?;
    mask.ensure_same_grid(land_use)?;

    let area = mask
        .data()
        .iter()
        .zip(pixel_area.data())
        .map(|(m, a)| if *m == 1 { *a } else { 0.0 })
        .collect();

    Ok(AreaStack {
        area: Raster::from_vec(*mask.grid(), area)?,
        land_use: land_use.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use greenspace_raster::{Crs, GeoTransform, GridSpec};

    fn grid(cols: usize) -> GridSpec {
        GridSpec::new(
            Crs::from_epsg(5070),
            GeoTransform::new(0.0, 30.0, 30.0, -30.0).unwrap(),
            1,
            cols,
        )
    }

    #[test]
    fn multiplies_mask_by_area() {
        let mask = Raster::from_vec(grid(4), vec![1, 0, u8::MAX, 1])
            .unwrap()
            .with_nodata(u8::MAX);
        let area = Raster::from_vec(grid(4), vec![900.0, 900.0, 900.0, 905.5]).unwrap();
        let land_use = Raster::from_vec(grid(4), vec![1110, 1110, 3100, LAND_USE_NODATA])
            .unwrap()
            .with_nodata(LAND_USE_NODATA);

        let stack = accumulate(&mask, &area, &land_use).unwrap();
        assert_eq!(stack.area.data(), &[900.0, 0.0, 0.0, 905.5]);
        assert_relative_eq!(stack.total_area(), 1805.5);
        assert_relative_eq!(stack.unclassified_area(), 905.5);
        assert!(stack.area.data().iter().all(|a| *a >= 0.0));
    }

    #[test]
    fn rejects_misaligned_inputs() {
        let mask = Raster::filled(grid(2), 1_u8);
        let area = Raster::filled(grid(3), 900.0);
        let land_use = Raster::filled(grid(2), 1110_u32);
        assert!(matches!(
            accumulate(&mask, &area, &land_use),
            Err(SpatialError::Raster(_))
        ));
    }
}
