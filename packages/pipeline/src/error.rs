//! Error types for project loading and pipeline runs.

use greenspace_export::ExportError;
use greenspace_imagery::ImageryError;
use greenspace_models::{Percentile, Stage};
use greenspace_raster::RasterError;
use greenspace_schema::SchemaError;
use greenspace_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur while loading a project file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the project file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The project file is not valid TOML for a project.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The project file parsed but is not usable.
    #[error("Invalid project: {0}")]
    Invalid(String),
}

/// Underlying failure of a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Schema could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Raster operation failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Imagery, index, or threshold failure.
    #[error(transparent)]
    Imagery(#[from] ImageryError),

    /// Vector layer or zonal failure.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Flattening or writing the table failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A failed run, labelled with the year, percentile, and stage it hit.
///
/// `percentile` is `None` for failures in the per-year preparation shared
/// by every percentile of that year.
#[derive(Debug, Error)]
#[error(
    "{year} {} failed at stage {stage}: {source}",
    .percentile.map_or_else(|| "(all percentiles)".to_string(), |p| p.to_string())
)]
pub struct PipelineError {
    /// Survey year.
    pub year: u16,
    /// Percentile, when the failure is specific to one.
    pub percentile: Option<Percentile>,
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub source: StageError,
}

/// Attaches a `(year, percentile, stage)` label to a stage result.
pub(crate) trait StageContext<T> {
    fn at(self, year: u16, percentile: Option<Percentile>, stage: Stage)
    -> Result<T, PipelineError>;
}

impl<T, E: Into<StageError>> StageContext<T> for Result<T, E> {
    fn at(
        self,
        year: u16,
        percentile: Option<Percentile>,
        stage: Stage,
    ) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            year,
            percentile,
            stage,
            source: e.into(),
        })
    }
}
