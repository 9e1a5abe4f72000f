//! Per-tract green area sums grouped by land-use code.
//!
//! The grid is cut into square tiles that are reduced in parallel. Each
//! tile only tests the tracts whose envelope intersects it. A green pixel
//! is credited to every tract whose interior holds its center; a center
//! that only touches tract boundaries goes to the lowest-position tract
//! touching it, so no center inside the tract union is lost. Tile
//! partial sums are merged in tile order, so the result does not depend on
//! scheduling. A tile that fails is retried; if it keeps failing, the
//! tracts it touches are reported as incomplete and left out rather than
//! returned with partial sums.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{Contains, Intersects, Point};
use greenspace_models::{GroupedAggregate, LandUseArea, LandUseCode};
use greenspace_raster::Window;
use rayon::prelude::*;

use crate::land_use::LAND_USE_NODATA;
use crate::{AreaStack, SpatialError, TractFeature, TractIndex};

/// Tiling knobs for the zonal reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonalOptions {
    /// Tile side length in pixels.
    pub tile_size: usize,
    /// Extra attempts for a failed tile.
    pub tile_retries: usize,
}

impl Default for ZonalOptions {
    fn default() -> Self {
        Self {
            tile_size: 256,
            tile_retries: 1,
        }
    }
}

/// Result of one zonal reduction.
#[derive(Debug, Clone, Default)]
pub struct ZonalOutcome {
    /// One aggregate per complete tract, in tract order. Tracts without
    /// green pixels have an empty group list.
    pub aggregates: Vec<GroupedAggregate>,
    /// Tracts left out because a tile they touch failed.
    pub incomplete: Vec<String>,
    /// Tiles that failed after all retries.
    pub failed_tiles: Vec<Window>,
    /// Green area inside tracts on pixels without a land-use code.
    pub unclassified_area: f64,
}

/// Partial sums of one tile, keyed by (tract position, code).
#[derive(Debug, Default)]
struct TileSums {
    sums: BTreeMap<(usize, u32), f64>,
    unclassified: f64,
}

/// Sums green area per tract and land-use code.
#[must_use]
pub fn aggregate(
    stack: &AreaStack,
    tracts: &[TractFeature],
    index: &TractIndex,
    options: ZonalOptions,
) -> ZonalOutcome {
    aggregate_tiles(stack, tracts, index, options, reduce_tile)
}

fn aggregate_tiles<F>(
    stack: &AreaStack,
    tracts: &[TractFeature],
    index: &TractIndex,
    options: ZonalOptions,
    reduce: F,
) -> ZonalOutcome
where
    F: Fn(&AreaStack, &[TractFeature], &[usize], &Window) -> Result<TileSums, SpatialError> + Sync,
{
    let grid = *stack.area.grid();
    let tiles = grid.tiles(options.tile_size);
    log::debug!(
        "Reducing {} tiles of up to {} px for {} tracts",
        tiles.len(),
        options.tile_size,
        tracts.len()
    );

    let results: Vec<(Window, Vec<usize>, Result<TileSums, SpatialError>)> = tiles
        .into_par_iter()
        .map(|tile| {
            let candidates = index.candidates(&grid.window_bounds(&tile));
            if candidates.is_empty() {
                return (tile, candidates, Ok(TileSums::default()));
            }
            let result = reduce_with_retries(&tile, options.tile_retries, || {
                reduce(stack, tracts, &candidates, &tile)
            });
            (tile, candidates, result)
        })
        .collect();

    let mut totals: BTreeMap<(usize, u32), f64> = BTreeMap::new();
    let mut incomplete = BTreeSet::new();
    let mut outcome = ZonalOutcome::default();

    for (tile, candidates, result) in results {
        match result {
            Ok(partial) => {
                for (key, area) in partial.sums {
                    *totals.entry(key).or_insert(0.0) += area;
                }
                outcome.unclassified_area += partial.unclassified;
            }
            Err(e) => {
                log::error!("{e}; {} tracts marked incomplete", candidates.len());
                incomplete.extend(candidates);
                outcome.failed_tiles.push(tile);
            }
        }
    }

    for (position, tract) in tracts.iter().enumerate() {
        if incomplete.contains(&position) {
            outcome.incomplete.push(tract.cluster_id.clone());
            continue;
        }
        let groups = totals
            .range((position, 0)..=(position, u32::MAX))
            .map(|(&(_, code), &area_m2)| LandUseArea {
                code: LandUseCode(code),
                area_m2,
            })
            .collect();
        outcome.aggregates.push(GroupedAggregate {
            cluster_id: tract.cluster_id.clone(),
            groups,
        });
    }

    outcome
}

/// Runs `attempt` up to `1 + retries` times, turning panics into errors.
fn reduce_with_retries(
    tile: &Window,
    retries: usize,
    attempt: impl Fn() -> Result<TileSums, SpatialError>,
) -> Result<TileSums, SpatialError> {
    let mut last_error = None;
    for n in 0..=retries {
        let result = catch_unwind(AssertUnwindSafe(&attempt)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(SpatialError::TileFailed {
                tile: *tile,
                message,
            })
        });
        match result {
            Ok(sums) => return Ok(sums),
            Err(e) => {
                log::warn!("Tile attempt {} of {} failed: {e}", n + 1, retries + 1);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| SpatialError::TileFailed {
        tile: *tile,
        message: "no attempt made".to_string(),
    }))
}

#[allow(clippy::unnecessary_wraps)]
fn reduce_tile(
    stack: &AreaStack,
    tracts: &[TractFeature],
    candidates: &[usize],
    tile: &Window,
) -> Result<TileSums, SpatialError> {
    let transform = stack.area.grid().transform;
    let mut partial = TileSums::default();

    for (row, col) in tile.cells() {
        let Some(area) = stack.area.get(row, col).filter(|a| *a > 0.0) else {
            continue;
        };
        let code = stack.land_use.get(row, col).unwrap_or(LAND_USE_NODATA);
        let (x, y) = transform.pixel_center(row, col);
        let point = Point::new(x, y);

        let mut owners: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&p| tracts[p].geometry.contains(&point))
            .collect();
        if owners.is_empty() {
            owners.extend(
                candidates
                    .iter()
                    .copied()
                    .find(|&p| tracts[p].geometry.intersects(&point)),
            );
        }

        for position in owners {
            if code == LAND_USE_NODATA {
                partial.unclassified += area;
            } else {
                *partial.sums.entry((position, code)).or_insert(0.0) += area;
            }
        }
    }

    Ok(partial)
}
