//! Land-use polygons and their rasterization onto the working grid.
//!
//! A pixel takes the code of the first polygon, in layer order, whose
//! closed area holds its center, so a center on an edge shared by two
//! polygons goes to the earlier one. Later polygons never overwrite earlier ones, so
//! overlaps resolve the same way on every run and no pixel is ever split
//! between categories. Pixels covered by no polygon are no-data.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use geo::{Intersects, MultiPolygon, Point};
use greenspace_models::LandUseCode;
use greenspace_raster::{GridSpec, Raster};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;
use crate::features::{VectorFeature, compute_envelope, read_features};

/// No-data value of land-use rasters.
pub const LAND_USE_NODATA: u32 = u32::MAX;

/// A land-use polygon with a known code.
#[derive(Debug, Clone)]
pub struct LandUsePolygon {
    /// Land-use category.
    pub code: LandUseCode,
    /// Polygon footprint.
    pub geometry: MultiPolygon<f64>,
}

/// Land-use polygons in layer order, after dropping unusable features.
#[derive(Debug, Clone, Default)]
pub struct LandUseLayer {
    /// Polygons with a code, in layer order.
    pub polygons: Vec<LandUsePolygon>,
    /// Features dropped because the code was null, missing, or not numeric.
    pub null_codes: usize,
    /// Features dropped because they had no polygonal geometry.
    pub non_polygonal: usize,
}

impl LandUseLayer {
    /// Loads a land-use layer, reading codes from `attribute`.
    ///
    /// # Errors
    ///
    /// * [`SpatialError`] if the file cannot be read or parsed
    /// * [`SpatialError::EmptyLayer`] if no polygon has a code
    pub fn load(path: &Path, attribute: &str) -> Result<Self, SpatialError> {
        let layer = Self::from_features(read_features(path)?, attribute);
        if layer.polygons.is_empty() {
            return Err(SpatialError::EmptyLayer {
                layer: path.display().to_string(),
            });
        }
        log::info!(
            "Loaded {} land-use polygons from {} ({} null codes, {} non-polygonal dropped)",
            layer.polygons.len(),
            path.display(),
            layer.null_codes,
            layer.non_polygonal
        );
        Ok(layer)
    }

    /// Keeps features that have both a polygon and a code in `attribute`.
    #[must_use]
    pub fn from_features(features: Vec<VectorFeature>, attribute: &str) -> Self {
        let mut layer = Self::default();
        for feature in features {
            let Some(code) = feature.property(attribute).and_then(parse_code) else {
                layer.null_codes += 1;
                continue;
            };
            let Some(geometry) = feature.geometry else {
                layer.non_polygonal += 1;
                continue;
            };
            layer.polygons.push(LandUsePolygon { code, geometry });
        }
        if layer.null_codes > 0 {
            log::debug!("Dropped {} land-use features without a {attribute} code", layer.null_codes);
        }
        layer
    }

    /// Polygon count per distinct code.
    #[must_use]
    pub fn code_counts(&self) -> BTreeMap<LandUseCode, usize> {
        let mut counts = BTreeMap::new();
        for polygon in &self.polygons {
            *counts.entry(polygon.code).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct codes present in the layer.
    #[must_use]
    pub fn codes(&self) -> BTreeSet<LandUseCode> {
        self.polygons.iter().map(|p| p.code).collect()
    }
}

/// Reads a land-use code from a JSON number or numeric string.
#[must_use]
pub fn parse_code(value: &serde_json::Value) -> Option<LandUseCode> {
    let code = match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .and_then(|f| format!("{f:.0}").parse().ok())
        })?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(code)
        .ok()
        .filter(|c| *c != LAND_USE_NODATA)
        .map(LandUseCode)
}

struct PolygonEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for PolygonEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Rasterizes `layer` onto `grid` by pixel center, first polygon wins.
#[must_use]
pub fn rasterize_land_use(layer: &LandUseLayer, grid: &GridSpec) -> Raster<u32> {
    let tree = RTree::bulk_load(
        layer
            .polygons
            .iter()
            .enumerate()
            .map(|(position, polygon)| PolygonEntry {
                position,
                envelope: compute_envelope(&polygon.geometry),
            })
            .collect(),
    );

    let transform = grid.transform;
    let mut raster = Raster::empty(*grid, LAND_USE_NODATA);
    raster
        .data_mut()
        .par_chunks_mut(grid.cols.max(1))
        .enumerate()
        .for_each(|(row, cells)| {
            let (x0, y) = transform.pixel_center(row, 0);
            let (x1, _) = transform.pixel_center(row, grid.cols.saturating_sub(1));
            let strip = AABB::from_corners([x0.min(x1), y], [x0.max(x1), y]);

            let mut candidates: Vec<usize> = tree
                .locate_in_envelope_intersecting(&strip)
                .map(|entry| entry.position)
                .collect();
            if candidates.is_empty() {
                return;
            }
            candidates.sort_unstable();

            for (col, cell) in cells.iter_mut().enumerate() {
                let (x, _) = transform.pixel_center(row, col);
                let point = Point::new(x, y);
                if let Some(position) = candidates
                    .iter()
                    .find(|&&p| layer.polygons[p].geometry.intersects(&point))
                {
                    *cell = layer.polygons[*position].code.0;
                }
            }
        });

    log::debug!(
        "Rasterized {} land-use polygons: {} of {} pixels classified",
        layer.polygons.len(),
        raster.count_valid(),
        grid.len()
    );
    raster
}
