//! Grid geometry: dimensions plus georeferencing, windows, and tiling.

use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

use crate::{Crs, GeoTransform};

/// Sub-pixel tolerance when deciding whether two lattices coincide.
const ALIGNMENT_TOLERANCE_PX: f64 = 1e-6;

/// A rectangular block of cells, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// First row.
    pub row: usize,
    /// First column.
    pub col: usize,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl Window {
    /// Creates a window.
    #[must_use]
    pub const fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self {
            row,
            col,
            rows,
            cols,
        }
    }

    /// One past the last row.
    #[must_use]
    pub const fn end_row(&self) -> usize {
        self.row + self.rows
    }

    /// One past the last column.
    #[must_use]
    pub const fn end_col(&self) -> usize {
        self.col + self.cols
    }

    /// Number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the window holds no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Overlap of two windows, if any.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let row = self.row.max(other.row);
        let col = self.col.max(other.col);
        let end_row = self.end_row().min(other.end_row());
        let end_col = self.end_col().min(other.end_col());
        (end_row > row && end_col > col).then(|| Self::new(row, col, end_row - row, end_col - col))
    }

    /// Iterates the `(row, col)` cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row..self.end_row()).flat_map(move |r| (self.col..self.end_col()).map(move |c| (r, c)))
    }
}

/// Dimensions and georeferencing shared by every raster on a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Coordinate reference system of the transform.
    pub crs: Crs,
    /// Pixel-to-map transform.
    pub transform: GeoTransform,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl GridSpec {
    /// Creates a grid.
    #[must_use]
    pub const fn new(crs: Crs, transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self {
            crs,
            transform,
            rows,
            cols,
        }
    }

    /// Number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Nominal resolution: the cell width in CRS units.
    #[must_use]
    pub fn nominal_scale(&self) -> f64 {
        self.transform.pixel_width.abs()
    }

    /// Map-coordinate extent of the grid.
    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        let first = self.transform.pixel_rect(0, 0);
        let last = self
            .transform
            .pixel_rect(self.rows.saturating_sub(1), self.cols.saturating_sub(1));
        Rect::new(
            coord! { x: first.min().x.min(last.min().x), y: first.min().y.min(last.min().y) },
            coord! { x: first.max().x.max(last.max().x), y: first.max().y.max(last.max().y) },
        )
    }

    /// Extent of a window in map coordinates.
    #[must_use]
    pub fn window_bounds(&self, window: &Window) -> Rect<f64> {
        let first = self.transform.pixel_rect(window.row, window.col);
        let last = self.transform.pixel_rect(
            window.end_row().saturating_sub(1),
            window.end_col().saturating_sub(1),
        );
        Rect::new(
            coord! { x: first.min().x.min(last.min().x), y: first.min().y.min(last.min().y) },
            coord! { x: first.max().x.max(last.max().x), y: first.max().y.max(last.max().y) },
        )
    }

    /// Smallest window holding every pixel whose center lies inside `rect`
    /// (edges inclusive), clipped to the grid. `None` when no pixel center
    /// qualifies.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn window_for(&self, rect: &Rect<f64>) -> Option<Window> {
        if self.is_empty() {
            return None;
        }
        let t = &self.transform;
        let (c_a, c_b) = (t.col_at(rect.min().x), t.col_at(rect.max().x));
        let (r_a, r_b) = (t.row_at(rect.min().y), t.row_at(rect.max().y));

        let col_lo = (c_a.min(c_b) - 0.5).ceil().max(0.0);
        let col_hi = (c_a.max(c_b) - 0.5).floor().min(self.cols as f64 - 1.0);
        let row_lo = (r_a.min(r_b) - 0.5).ceil().max(0.0);
        let row_hi = (r_a.max(r_b) - 0.5).floor().min(self.rows as f64 - 1.0);

        if col_hi < col_lo || row_hi < row_lo {
            return None;
        }

        let (row, col) = (row_lo as usize, col_lo as usize);
        Some(Window::new(
            row,
            col,
            row_hi as usize - row + 1,
            col_hi as usize - col + 1,
        ))
    }

    /// Pixel offset of `other`'s lattice within this one: pixel `(r, c)` of
    /// `other` is pixel `(r + dr, c + dc)` here. `None` when the grids do
    /// not share CRS, cell size, and an integral origin offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn offset_of(&self, other: &Self) -> Option<(isize, isize)> {
        if self.crs != other.crs {
            return None;
        }
        let (a, b) = (&self.transform, &other.transform);
        let same_size = (a.pixel_width - b.pixel_width).abs() <= a.pixel_width.abs() * 1e-9
            && (a.pixel_height - b.pixel_height).abs() <= a.pixel_height.abs() * 1e-9;
        if !same_size {
            return None;
        }

        let dc = a.col_at(b.origin_x);
        let dr = a.row_at(b.origin_y);
        let (dc_round, dr_round) = (dc.round(), dr.round());
        if (dc - dc_round).abs() > ALIGNMENT_TOLERANCE_PX
            || (dr - dr_round).abs() > ALIGNMENT_TOLERANCE_PX
        {
            return None;
        }
        Some((dr_round as isize, dc_round as isize))
    }

    /// A grid on this grid's lattice (same CRS and cell size, origin
    /// snapped to a cell edge) whose extent covers `rect`. The result may
    /// extend beyond this grid's own extent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn aligned_extent(&self, rect: &Rect<f64>) -> Self {
        let t = &self.transform;
        let (c_a, c_b) = (t.col_at(rect.min().x), t.col_at(rect.max().x));
        let (r_a, r_b) = (t.row_at(rect.min().y), t.row_at(rect.max().y));

        let col0 = c_a.min(c_b).floor();
        let col1 = c_a.max(c_b).ceil().max(col0 + 1.0);
        let row0 = r_a.min(r_b).floor();
        let row1 = r_a.max(r_b).ceil().max(row0 + 1.0);

        let transform = GeoTransform {
            origin_x: t.origin_x + col0 * t.pixel_width,
            origin_y: t.origin_y + row0 * t.pixel_height,
            pixel_width: t.pixel_width,
            pixel_height: t.pixel_height,
        };
        Self::new(
            self.crs,
            transform,
            (row1 - row0) as usize,
            (col1 - col0) as usize,
        )
    }

    /// Splits the grid into square tiles of at most `tile_size` cells per
    /// side, in row-major tile order.
    #[must_use]
    pub fn tiles(&self, tile_size: usize) -> Vec<Window> {
        let size = tile_size.max(1);
        let mut tiles = Vec::new();
        for row in (0..self.rows).step_by(size) {
            for col in (0..self.cols).step_by(size) {
                tiles.push(Window::new(
                    row,
                    col,
                    size.min(self.rows - row),
                    size.min(self.cols - col),
                ));
            }
        }
        tiles
    }
}
