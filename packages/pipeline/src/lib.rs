#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Green space pipeline driver.
//!
//! Loads a project file, prepares each survey year once (composite,
//! vegetation index, threshold sample, land-use raster, pixel areas), then
//! runs each percentile of that year independently and in parallel:
//! green mask, area stack, zonal sums per tract and land-use code, and a
//! wide CSV table. A failing `(year, percentile)` run is reported with its
//! stage and never stops its siblings.

pub mod check;
pub mod config;
pub mod error;
pub mod prepare;
pub mod progress;
pub mod run;

pub use check::{CheckReport, YearCheck, check};
pub use config::{InputPaths, ProjectConfig, YearInputs};
pub use error::{ConfigError, PipelineError, StageError};
pub use prepare::{PreparedYear, SharedInputs, prepare_year};
pub use progress::{NullProgress, ProgressCallback};
pub use run::{RunOutcome, RunSelection, RunStats, RunSummary, run_all, run_percentile};
