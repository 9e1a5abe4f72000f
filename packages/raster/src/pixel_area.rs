//! Ground area of every pixel on a grid, in square meters.
//!
//! Geographic grids use the geodesic area of each cell footprint on the
//! WGS84 ellipsoid. UTM grids divide the planar cell area by the square of
//! the Transverse Mercator point scale factor at the cell center, which
//! varies with distance from the central meridian. Other projected grids
//! are assumed equal-area and use the planar cell area.

use geo::GeodesicArea;

use crate::{Crs, GridSpec, Raster};

/// UTM scale factor on the central meridian.
const UTM_K0: f64 = 0.9996;
/// UTM false easting in meters.
const UTM_FALSE_EASTING: f64 = 500_000.0;
/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Builds a raster holding the ground area (m²) of each pixel of `grid`.
#[must_use]
pub fn pixel_area(grid: &GridSpec) -> Raster<f64> {
    let mut raster = Raster::filled(*grid, 0.0);
    let cols = grid.cols;

    match grid.crs {
        Crs::Geographic => {
            // Area depends on latitude only, so one cell per row suffices.
            for row in 0..grid.rows {
                let area = grid
                    .transform
                    .pixel_rect(row, 0)
                    .to_polygon()
                    .geodesic_area_unsigned();
                raster.data_mut()[row * cols..(row + 1) * cols].fill(area);
            }
        }
        Crs::Utm { .. } => {
            let planar = grid.transform.cell_area();
            // Scale depends on easting only, so one factor per column.
            let factors: Vec<f64> = (0..cols)
                .map(|col| utm_scale_factor(grid.transform.pixel_center(0, col).0))
                .collect();
            for (i, cell) in raster.data_mut().iter_mut().enumerate() {
                let k = factors[i % cols];
                *cell = planar / (k * k);
            }
        }
        Crs::Projected { epsg } => {
            log::warn!(
                "No area model for EPSG:{epsg}, treating planar cell area as ground area"
            );
            raster.data_mut().fill(grid.transform.cell_area());
        }
    }

    raster
}

/// Transverse Mercator point scale factor at a UTM easting.
#[must_use]
pub fn utm_scale_factor(easting: f64) -> f64 {
    let x = (easting - UTM_FALSE_EASTING) / UTM_K0;
    let q = (x * x) / (EARTH_RADIUS_M * EARTH_RADIUS_M);
    UTM_K0 * (1.0 + q / 2.0 + q * q / 24.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoTransform;
    use approx::assert_relative_eq;

    #[test]
    fn utm_central_meridian_is_k0() {
        assert_relative_eq!(utm_scale_factor(500_000.0), UTM_K0);
        assert!(utm_scale_factor(320_000.0) > UTM_K0);
        assert_relative_eq!(
            utm_scale_factor(320_000.0),
            utm_scale_factor(680_000.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn utm_areas_follow_scale_factor() {
        let grid = GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(499_985.0, 4_600_000.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        let areas = pixel_area(&grid);
        // Central meridian: cells are slightly larger on the ground.
        assert_relative_eq!(areas.data()[0], 900.0 / (UTM_K0 * UTM_K0), epsilon = 1e-6);
        assert_relative_eq!(areas.data()[0], areas.data()[2]);

        let edge = GridSpec::new(
            grid.crs,
            GeoTransform::new(320_000.0, 4_600_000.0, 30.0, -30.0).unwrap(),
            1,
            1,
        );
        // ~180 km from the central meridian the scale is close to one.
        assert_relative_eq!(pixel_area(&edge).data()[0], 900.0, max_relative = 1e-3);
    }

    #[test]
    fn geographic_areas_shrink_with_latitude() {
        let grid = GridSpec::new(
            Crs::Geographic,
            GeoTransform::new(0.0, 61.0, 1.0, -1.0).unwrap(),
            61,
            2,
        );
        let areas = pixel_area(&grid);
        let north = areas.get(0, 0).unwrap();
        let equator = areas.get(60, 0).unwrap();
        assert!(equator > 1.2e10 && equator < 1.25e10);
        let ratio = north / equator;
        assert!(ratio > 0.47 && ratio < 0.52, "ratio = {ratio}");
        assert_relative_eq!(areas.get(30, 0).unwrap(), areas.get(30, 1).unwrap());
    }

    #[test]
    fn other_projections_use_planar_area() {
        let grid = GridSpec::new(
            Crs::from_epsg(5070),
            GeoTransform::new(0.0, 0.0, 30.0, -30.0).unwrap(),
            2,
            2,
        );
        assert!(pixel_area(&grid).data().iter().all(|a| (*a - 900.0).abs() < 1e-9));
    }
}
