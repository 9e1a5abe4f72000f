//! Project file: input layers, per-year catalogs, and tuning knobs.
//!
//! ```toml
//! output_dir = "out"
//! tile_size = 256
//! schema_policy = "log"
//!
//! [inputs]
//! tracts = "tracts.geojson"
//! study_area = "study_area.geojson"
//!
//! [[years]]
//! year = 1990
//! scenes = "scenes/1990.toml"
//! land_use = "landuse/lu1990.geojson"
//! ```
//!
//! Relative paths are resolved against the directory of the project file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use greenspace_export::SchemaPolicy;
use greenspace_imagery::composite::DEFAULT_CLOUD_SCORE_RANGE;
use greenspace_imagery::threshold::DEFAULT_MIN_SAMPLE_PIXELS;
use greenspace_models::{LandUseSchema, Percentile};
use greenspace_schema::{SchemaError, load_schema_file, schema_for_year};
use greenspace_spatial::ZonalOptions;
use serde::Deserialize;

use crate::ConfigError;

/// Shared vector inputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputPaths {
    /// Tract layer (GeoJSON with a `cluster_id` property).
    pub tracts: PathBuf,
    /// Study area polygon(s), used for threshold sampling.
    pub study_area: PathBuf,
}

/// Inputs for one survey year.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct YearInputs {
    /// Survey year; selects the embedded schema unless `schema` is set.
    pub year: u16,
    /// Scene catalog TOML.
    pub scenes: PathBuf,
    /// Land-use polygon layer.
    pub land_use: PathBuf,
    /// Schema file replacing the embedded one.
    #[serde(default)]
    pub schema: Option<PathBuf>,
}

impl YearInputs {
    /// The schema for this year: the override file when given, else the
    /// embedded schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the override cannot be loaded, names
    /// another year, or no schema is embedded for the year.
    pub fn resolve_schema(&self) -> Result<LandUseSchema, SchemaError> {
        let schema = match &self.schema {
            Some(path) => load_schema_file(path)?,
            None => schema_for_year(self.year).ok_or_else(|| SchemaError::Invalid {
                year: self.year,
                message: "no embedded schema for this year".to_string(),
            })?,
        };

        if schema.year != self.year {
            return Err(SchemaError::Invalid {
                year: self.year,
                message: format!("schema file describes year {}", schema.year),
            });
        }
        Ok(schema)
    }
}

const fn default_tile_size() -> usize {
    256
}

const fn default_tile_retries() -> usize {
    1
}

const fn default_min_sample_pixels() -> usize {
    DEFAULT_MIN_SAMPLE_PIXELS
}

const fn default_cloud_score_range() -> f64 {
    DEFAULT_CLOUD_SCORE_RANGE
}

const fn default_max_uncovered_fraction() -> f64 {
    1.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_percentiles() -> Vec<Percentile> {
    Percentile::STANDARD.to_vec()
}

/// A parsed project file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectConfig {
    /// Directory receiving the CSV tables.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Zonal tile edge in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,
    /// Retries for a failed zonal tile.
    #[serde(default = "default_tile_retries")]
    pub tile_retries: usize,
    /// Fewest valid study-area pixels a threshold may be drawn from.
    #[serde(default = "default_min_sample_pixels")]
    pub min_sample_pixels: usize,
    /// Cloud score margin above the per-pixel minimum kept in composites.
    #[serde(default = "default_cloud_score_range")]
    pub cloud_score_range: f64,
    /// Largest share of study-area pixels allowed to lack a composite
    /// value before the year fails. `1.0` only reports the gap.
    #[serde(default = "default_max_uncovered_fraction")]
    pub max_uncovered_fraction: f64,
    /// Handling of land-use codes outside a year's schema.
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
    /// Percentiles run for every year.
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<Percentile>,
    /// Shared vector inputs.
    pub inputs: InputPaths,
    /// Per-year inputs.
    pub years: Vec<YearInputs>,
}

impl ProjectConfig {
    /// Parses and validates a project, resolving relative paths against
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Toml`] if the text does not describe a project
    /// * [`ConfigError::Invalid`] if the project fails validation
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    /// Loads a project file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&text, base_dir)?;
        log::info!(
            "Loaded project {} ({} years, percentiles {})",
            path.display(),
            config.years.len(),
            config
                .percentiles
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(config)
    }

    /// Inputs for `year`, if configured.
    #[must_use]
    pub fn year(&self, year: u16) -> Option<&YearInputs> {
        self.years.iter().find(|y| y.year == year)
    }

    /// Zonal tiling options.
    #[must_use]
    pub const fn zonal_options(&self) -> ZonalOptions {
        ZonalOptions {
            tile_size: self.tile_size,
            tile_retries: self.tile_retries,
        }
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| *path = base_dir.join(&*path);

        resolve(&mut self.output_dir);
        resolve(&mut self.inputs.tracts);
        resolve(&mut self.inputs.study_area);
        for year in &mut self.years {
            resolve(&mut year.scenes);
            resolve(&mut year.land_use);
            if let Some(schema) = year.schema.as_mut() {
                resolve(schema);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.years.is_empty() {
            return Err(ConfigError::Invalid("no [[years]] configured".to_string()));
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be positive".to_string()));
        }
        if self.min_sample_pixels == 0 {
            return Err(ConfigError::Invalid(
                "min_sample_pixels must be positive".to_string(),
            ));
        }
        if !(self.cloud_score_range.is_finite() && self.cloud_score_range >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cloud_score_range {} must be a non-negative number",
                self.cloud_score_range
            )));
        }
        if !(0.0..=1.0).contains(&self.max_uncovered_fraction) {
            return Err(ConfigError::Invalid(format!(
                "max_uncovered_fraction {} must be between 0 and 1",
                self.max_uncovered_fraction
            )));
        }
        if self.percentiles.is_empty() {
            return Err(ConfigError::Invalid("no percentiles configured".to_string()));
        }
        let mut percentiles = BTreeSet::new();
        for percentile in &self.percentiles {
            if !percentiles.insert(*percentile) {
                return Err(ConfigError::Invalid(format!(
                    "percentile {percentile} is configured twice"
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for year in &self.years {
            if !seen.insert(year.year) {
                return Err(ConfigError::Invalid(format!(
                    "year {} is configured twice",
                    year.year
                )));
            }
            if year.schema.is_none() && schema_for_year(year.year).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "year {} has no embedded schema and no schema file",
                    year.year
                )));
            }
        }
        Ok(())
    }
}
