//! Row-major raster container.

use std::fmt::Debug;

use crate::{GridSpec, RasterError};

/// Types that can be stored in a raster cell.
pub trait RasterElement: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// No-data value used when a raster is created without one.
    fn default_nodata() -> Self;

    /// Whether this value represents no-data.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Lossless-enough conversion for summaries and logging.
    fn to_f64(self) -> f64;
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                nodata.is_some_and(|nd| *self == nd)
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }
        }
    };
}

impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

/// A georeferenced grid of cells stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: RasterElement> {
    grid: GridSpec,
    data: Vec<T>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Creates a raster with every cell set to `value`.
    #[must_use]
    pub fn filled(grid: GridSpec, value: T) -> Self {
        Self {
            grid,
            data: vec![value; grid.len()],
            nodata: None,
        }
    }

    /// Creates a raster with every cell set to no-data.
    #[must_use]
    pub fn empty(grid: GridSpec, nodata: T) -> Self {
        Self::filled(grid, nodata).with_nodata(nodata)
    }

    /// Wraps an existing row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] when `data` does not hold
    /// exactly `rows * cols` cells.
    pub fn from_vec(grid: GridSpec, data: Vec<T>) -> Result<Self, RasterError> {
        if data.len() != grid.len() {
            return Err(RasterError::DimensionMismatch {
                expected_rows: grid.rows,
                expected_cols: grid.cols,
                rows: data.len() / grid.cols.max(1),
                cols: grid.cols,
            });
        }
        Ok(Self {
            grid,
            data,
            nodata: None,
        })
    }

    /// Sets the explicit no-data value.
    #[must_use]
    pub const fn with_nodata(mut self, nodata: T) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Grid of this raster.
    #[must_use]
    pub const fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Explicit no-data value, if any.
    #[must_use]
    pub const fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.grid.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.grid.cols
    }

    /// Cell buffer in row-major order.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable cell buffer in row-major order.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Raw value at (`row`, `col`), or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        (row < self.grid.rows && col < self.grid.cols)
            .then(|| self.data[row * self.grid.cols + col])
    }

    /// Valid value at (`row`, `col`): `None` when out of bounds or no-data.
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<T> {
        self.get(row, col).filter(|v| !v.is_nodata(self.nodata))
    }

    /// Writes a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        if row < self.grid.rows && col < self.grid.cols {
            self.data[row * self.grid.cols + col] = value;
        }
    }

    /// Whether `value` is this raster's no-data.
    #[must_use]
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Iterates the valid values, skipping no-data.
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nodata(self.nodata))
    }

    /// Number of cells that are not no-data.
    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.valid_values().count()
    }

    /// Applies `f` to every valid cell, producing a raster of another type
    /// on the same grid. No-data cells become `nodata`.
    pub fn map<U: RasterElement>(&self, nodata: U, f: impl Fn(T) -> U) -> Raster<U> {
        let data = self
            .data
            .iter()
            .map(|v| if v.is_nodata(self.nodata) { nodata } else { f(*v) })
            .collect();
        Raster {
            grid: self.grid,
            data,
            nodata: Some(nodata),
        }
    }

    /// Checks that `other` sits on exactly the same grid.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] describing the first difference.
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<(), RasterError> {
        ensure_same_grid(&self.grid, &other.grid)
    }
}

/// Checks that two grids are identical.
///
/// # Errors
///
/// Returns [`RasterError::GridMismatch`] describing the first difference.
pub fn ensure_same_grid(a: &GridSpec, b: &GridSpec) -> Result<(), RasterError> {
    if a.crs != b.crs {
        return Err(RasterError::GridMismatch {
            message: format!("CRS {} vs {}", a.crs, b.crs),
        });
    }
    if (a.rows, a.cols) != (b.rows, b.cols) {
        return Err(RasterError::GridMismatch {
            message: format!("size {}x{} vs {}x{}", a.rows, a.cols, b.rows, b.cols),
        });
    }
    if a.transform != b.transform {
        return Err(RasterError::GridMismatch {
            message: format!("transform {:?} vs {:?}", a.transform, b.transform),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Crs, GeoTransform};

    fn grid(rows: usize, cols: usize) -> GridSpec {
        GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 0.0, 30.0, -30.0).unwrap(),
            rows,
            cols,
        )
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Raster::from_vec(grid(2, 2), vec![0.0_f32; 4]).is_ok());
        assert!(matches!(
            Raster::from_vec(grid(2, 2), vec![0.0_f32; 3]),
            Err(RasterError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn value_hides_nodata_and_nan() {
        let r = Raster::from_vec(grid(1, 3), vec![0.5_f32, -9999.0, f32::NAN])
            .unwrap()
            .with_nodata(-9999.0);
        assert_eq!(r.value(0, 0), Some(0.5));
        assert_eq!(r.value(0, 1), None);
        assert_eq!(r.value(0, 2), None);
        assert_eq!(r.value(0, 3), None);
        assert_eq!(r.count_valid(), 1);
    }

    #[test]
    fn integer_rasters_without_nodata_are_all_valid() {
        let r = Raster::filled(grid(2, 2), u32::MAX);
        assert_eq!(r.count_valid(), 4);
        let r = r.with_nodata(u32::MAX);
        assert_eq!(r.count_valid(), 0);
    }

    #[test]
    fn map_propagates_nodata() {
        let r = Raster::from_vec(grid(1, 3), vec![0.2_f32, 0.8, -9999.0])
            .unwrap()
            .with_nodata(-9999.0);
        let mask = r.map(u8::MAX, |v| u8::from(v > 0.5));
        assert_eq!(mask.data(), &[0, 1, u8::MAX]);
        assert_eq!(mask.nodata(), Some(u8::MAX));
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut r = Raster::filled(grid(2, 3), 0_u8);
        r.set(1, 2, 7);
        r.set(5, 5, 9);
        assert_eq!(r.data(), &[0, 0, 0, 0, 0, 7]);
        assert_eq!(r.get(5, 5), None);
    }

    #[test]
    fn grid_mismatch_is_reported() {
        let a = Raster::filled(grid(2, 2), 0_u8);
        let b = Raster::filled(grid(2, 3), 0.0_f32);
        assert!(a.ensure_same_grid(&b).is_err());
        assert!(a.ensure_same_grid(&a.clone()).is_ok());
    }
}
