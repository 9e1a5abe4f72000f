//! North-up affine geotransform.

use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

use crate::RasterError;

/// Affine coefficients mapping pixel (col, row) to map (x, y) for a
/// north-up grid:
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative when row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner.
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner.
    pub origin_y: f64,
    /// Cell size in X.
    pub pixel_width: f64,
    /// Cell size in Y, usually negative.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Creates a transform, rejecting zero or non-finite cell sizes.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidTransform`] for degenerate coefficients.
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        pixel_width: f64,
        pixel_height: f64,
    ) -> Result<Self, RasterError> {
        let finite = [origin_x, origin_y, pixel_width, pixel_height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || pixel_width <= 0.0 || pixel_height == 0.0 {
            return Err(RasterError::InvalidTransform(format!(
                "origin=({origin_x}, {origin_y}) size=({pixel_width}, {pixel_height})"
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        })
    }

    /// Builds a transform from `[origin_x, pixel_width, origin_y, pixel_height]`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidTransform`] for degenerate coefficients.
    pub fn from_array(coeffs: [f64; 4]) -> Result<Self, RasterError> {
        Self::new(coeffs[0], coeffs[2], coeffs[1], coeffs[3])
    }

    /// Map coordinates of the center of pixel (`row`, `col`).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Footprint of pixel (`row`, `col`) in map coordinates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_rect(&self, row: usize, col: usize) -> Rect<f64> {
        let x0 = self.origin_x + col as f64 * self.pixel_width;
        let y0 = self.origin_y + row as f64 * self.pixel_height;
        Rect::new(
            coord! { x: x0, y: y0 },
            coord! { x: x0 + self.pixel_width, y: y0 + self.pixel_height },
        )
    }

    /// Fractional column of map `x` (pixel edges at integers).
    #[must_use]
    pub fn col_at(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.pixel_width
    }

    /// Fractional row of map `y` (pixel edges at integers).
    #[must_use]
    pub fn row_at(&self, y: f64) -> f64 {
        (y - self.origin_y) / self.pixel_height
    }

    /// Absolute cell area in squared map units.
    #[must_use]
    pub fn cell_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_center_is_half_cell_in() {
        let t = GeoTransform::new(1000.0, 2000.0, 30.0, -30.0).unwrap();
        let (x, y) = t.pixel_center(0, 0);
        assert_relative_eq!(x, 1015.0);
        assert_relative_eq!(y, 1985.0);
        let (x, y) = t.pixel_center(2, 3);
        assert_relative_eq!(x, 1105.0);
        assert_relative_eq!(y, 1925.0);
    }

    #[test]
    fn fractional_positions_invert_centers() {
        let t = GeoTransform::new(1000.0, 2000.0, 30.0, -30.0).unwrap();
        let (x, y) = t.pixel_center(4, 7);
        assert_relative_eq!(t.col_at(x), 7.5);
        assert_relative_eq!(t.row_at(y), 4.5);
    }

    #[test]
    fn from_array_uses_catalog_order() {
        let t = GeoTransform::from_array([500.0, 30.0, 900.0, -30.0]).unwrap();
        assert_relative_eq!(t.origin_x, 500.0);
        assert_relative_eq!(t.origin_y, 900.0);
        assert_relative_eq!(t.cell_area(), 900.0);
    }

    #[test]
    fn rejects_degenerate_cells() {
        assert!(GeoTransform::new(0.0, 0.0, 0.0, -30.0).is_err());
        assert!(GeoTransform::new(0.0, 0.0, 30.0, 0.0).is_err());
        assert!(GeoTransform::new(f64::NAN, 0.0, 30.0, -30.0).is_err());
    }
}
