//! Per-percentile runs and the project-wide driver.
//!
//! Every `(year, percentile)` pair is an independent run: a failure is
//! logged and recorded in its [`RunSummary`] without touching sibling
//! runs. Percentiles of one year share a [`PreparedYear`] and run in
//! parallel; years run one after another to bound peak memory.

use std::collections::BTreeSet;
use std::path::PathBuf;

use greenspace_export::{flatten_table, write_table_file};
use greenspace_imagery::green_mask;
use greenspace_models::{Percentile, RunKey, Stage};
use greenspace_spatial::{SpatialError, accumulate, aggregate};
use rayon::prelude::*;

use crate::config::ProjectConfig;
use crate::error::StageContext;
use crate::prepare::{PreparedYear, SharedInputs, prepare_year};
use crate::{PipelineError, ProgressCallback};

/// Counts and areas reported for a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// Index value used as the green cutoff.
    pub threshold: f64,
    /// Rows written.
    pub rows: usize,
    /// Tract features rejected while loading the layer.
    pub rejected_tracts: usize,
    /// Tracts omitted because a tile they touch failed.
    pub incomplete_tracts: usize,
    /// Green area inside tracts that has no land-use code (m²).
    pub unclassified_area: f64,
    /// Green area dropped because its code is not in the schema (m²).
    pub unknown_code_area: f64,
    /// Study-area pixels the composite left without a value.
    pub uncovered_study_area_pixels: usize,
    /// Table written.
    pub output: PathBuf,
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The table was written.
    Completed(RunStats),
    /// The run failed at `stage`.
    Failed {
        /// Stage that failed.
        stage: Stage,
        /// Diagnostic message.
        message: String,
    },
}

/// Outcome of one `(year, percentile)` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Year and percentile.
    pub key: RunKey,
    /// What happened.
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn failed(key: RunKey, err: &PipelineError) -> Self {
        Self {
            key,
            outcome: RunOutcome::Failed {
                stage: err.stage,
                message: err.to_string(),
            },
        }
    }

    /// Whether the run wrote its table.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }
}

/// Which runs to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSelection {
    /// Years to run; all configured years when `None`.
    pub years: Option<Vec<u16>>,
    /// Percentiles to run; the configured list when `None`.
    pub percentiles: Option<Vec<Percentile>>,
}

/// Thresholds, masks, aggregates, and writes the table for one
/// percentile of a prepared year.
///
/// # Errors
///
/// Returns [`PipelineError`] labelled with the year, percentile, and
/// failing stage.
pub fn run_percentile(
    config: &ProjectConfig,
    prepared: &PreparedYear,
    shared: &SharedInputs,
    percentile: Percentile,
) -> Result<RunStats, PipelineError> {
    let year = prepared.schema.year;
    let at = Some(percentile);

    let threshold = prepared.sampler.threshold(percentile);
    log::debug!("{year} {percentile}: threshold {threshold}");

    let mask = green_mask(&prepared.index, threshold);
    let stack = accumulate(&mask, &prepared.pixel_area, &prepared.land_use)
        .at(year, at, Stage::Accumulate)?;

    let outcome = aggregate(
        &stack,
        &shared.tracts.tracts,
        &shared.tract_index,
        config.zonal_options(),
    );
    if !outcome.incomplete.is_empty() {
        log::warn!(
            "{year} {percentile}: {} tracts omitted after {} tiles failed",
            outcome.incomplete.len(),
            outcome.failed_tiles.len()
        );
    }
    if outcome.aggregates.is_empty() {
        return Err(SpatialError::EmptyLayer {
            layer: "aggregated tracts".to_string(),
        })
        .at(year, at, Stage::Aggregate);
    }

    let table = flatten_table(&outcome.aggregates, &prepared.schema, config.schema_policy)
        .at(year, at, Stage::Export)?;
    let output = config
        .output_dir
        .join(prepared.schema.table_file_name(percentile));
    write_table_file(&table, &output).at(year, at, Stage::Export)?;

    Ok(RunStats {
        threshold,
        rows: table.rows.len(),
        rejected_tracts: shared.tracts.rejected.len(),
        incomplete_tracts: outcome.incomplete.len(),
        unclassified_area: outcome.unclassified_area,
        unknown_code_area: table.unknown_area(),
        uncovered_study_area_pixels: prepared.uncovered_study_area_pixels,
        output,
    })
}

/// Runs every selected `(year, percentile)` pair.
///
/// Summaries come back in year order, then percentile order, whatever
/// the scheduling. A percentile selected twice runs once.
///
/// # Errors
///
/// Returns [`SpatialError`] only if the shared tract or study-area
/// layers cannot be loaded; every later failure is recorded in the
/// affected summaries.
pub fn run_all(
    config: &ProjectConfig,
    selection: &RunSelection,
    progress: &dyn ProgressCallback,
) -> Result<Vec<RunSummary>, SpatialError> {
    let shared = SharedInputs::load(config)?;

    let years: Vec<_> = config
        .years
        .iter()
        .filter(|y| {
            selection
                .years
                .as_ref()
                .is_none_or(|selected| selected.contains(&y.year))
        })
        .collect();
    let mut percentiles = selection
        .percentiles
        .clone()
        .unwrap_or_else(|| config.percentiles.clone());
    let mut seen = BTreeSet::new();
    percentiles.retain(|p| seen.insert(*p));

    progress.set_total((years.len() * percentiles.len()) as u64);
    let mut summaries = Vec::with_capacity(years.len() * percentiles.len());

    for inputs in years {
        let keys = percentiles.iter().map(|p| RunKey {
            year: inputs.year,
            percentile: *p,
        });

        let prepared = match prepare_year(config, inputs, &shared, progress) {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("{e}");
                summaries.extend(keys.map(|key| RunSummary::failed(key, &e)));
                progress.inc(percentiles.len() as u64);
                continue;
            }
        };

        progress.set_message(format!("{}: percentile runs", inputs.year));
        let results: Vec<RunSummary> = keys
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|key| {
                let summary = match run_percentile(config, &prepared, &shared, key.percentile) {
                    Ok(stats) => {
                        log::info!(
                            "{key}: threshold {:.4}, {} rows -> {}",
                            stats.threshold,
                            stats.rows,
                            stats.output.display()
                        );
                        RunSummary {
                            key,
                            outcome: RunOutcome::Completed(stats),
                        }
                    }
                    Err(e) => {
                        log::error!("{e}");
                        RunSummary::failed(key, &e)
                    }
                };
                progress.inc(1);
                summary
            })
            .collect();
        summaries.extend(results);
    }

    let failed = summaries.iter().filter(|s| !s.is_completed()).count();
    progress.finish(format!("{} runs, {failed} failed", summaries.len()));
    Ok(summaries)
}
