//! Input validation without touching pixel data.

use greenspace_imagery::SceneCatalog;
use greenspace_models::LandUseCode;
use greenspace_spatial::{LandUseLayer, RejectedTract, SpatialError, TractLayer, load_study_area};

use crate::config::{ProjectConfig, YearInputs};

/// What `check` found for one year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearCheck {
    /// Survey year.
    pub year: u16,
    /// Schema name, when the schema resolved.
    pub schema_name: Option<String>,
    /// Schema column count.
    pub schema_codes: usize,
    /// Scenes in the catalog.
    pub catalog_scenes: usize,
    /// Scenes acquired inside the imagery window.
    pub scenes_in_window: Vec<String>,
    /// Whether the reference scene is listed.
    pub reference_found: bool,
    /// Land-use polygons with a code.
    pub land_use_polygons: usize,
    /// Land-use features without a usable code.
    pub null_codes: usize,
    /// Codes in the layer that the schema does not list.
    pub unknown_codes: Vec<LandUseCode>,
    /// Problems that would stop this year from running.
    pub errors: Vec<String>,
}

impl YearCheck {
    /// Whether the year would run.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What `check` found for the whole project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Usable tracts.
    pub tracts: usize,
    /// Tract features that would be skipped.
    pub rejected: Vec<RejectedTract>,
    /// Polygons in the merged study area.
    pub study_area_polygons: usize,
    /// Per-year findings in configuration order.
    pub years: Vec<YearCheck>,
}

impl CheckReport {
    /// Whether every year would run.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.years.iter().all(YearCheck::is_ok)
    }
}

/// Loads the project's layers, schemas, and catalogs and reports what a
/// run would see.
///
/// # Errors
///
/// Returns [`SpatialError`] if the tract layer or the study area cannot
/// be loaded. Per-year problems are recorded in the report instead.
pub fn check(config: &ProjectConfig) -> Result<CheckReport, SpatialError> {
    let tracts = TractLayer::load(&config.inputs.tracts)?;
    let study_area = load_study_area(&config.inputs.study_area)?;

    Ok(CheckReport {
        tracts: tracts.tracts.len(),
        rejected: tracts.rejected,
        study_area_polygons: study_area.0.len(),
        years: config.years.iter().map(check_year).collect(),
    })
}

fn check_year(inputs: &YearInputs) -> YearCheck {
    let mut report = YearCheck {
        year: inputs.year,
        ..YearCheck::default()
    };

    let schema = match inputs.resolve_schema() {
        Ok(schema) => schema,
        Err(e) => {
            report.errors.push(format!("schema: {e}"));
            return report;
        }
    };
    report.schema_name = Some(schema.name.clone());
    report.schema_codes = schema.codes.len();

    match SceneCatalog::load(&inputs.scenes) {
        Ok(catalog) => {
            report.catalog_scenes = catalog.scenes.len();
            report.reference_found = catalog.find(&schema.imagery.reference_scene).is_some();
            report.scenes_in_window = catalog
                .scenes
                .iter()
                .filter(|s| schema.imagery.in_window(s.acquired))
                .map(|s| s.id.clone())
                .collect();

            if catalog.collection != schema.imagery.collection {
                report.errors.push(format!(
                    "catalog is for {}, schema expects {}",
                    catalog.collection, schema.imagery.collection
                ));
            }
            if !report.reference_found {
                report.errors.push(format!(
                    "reference scene {} is not in the catalog",
                    schema.imagery.reference_scene
                ));
            }
            if report.scenes_in_window.is_empty() {
                report.errors.push(format!(
                    "no scenes acquired in {}..{}",
                    schema.imagery.window_start, schema.imagery.window_end
                ));
            }
        }
        Err(e) => report.errors.push(format!("scene catalog: {e}")),
    }

    match LandUseLayer::load(&inputs.land_use, &schema.attribute) {
        Ok(layer) => {
            report.land_use_polygons = layer.polygons.len();
            report.null_codes = layer.null_codes;
            report.unknown_codes = layer
                .codes()
                .into_iter()
                .filter(|code| !schema.contains(*code))
                .collect();
        }
        Err(e) => report.errors.push(format!("land use: {e}")),
    }

    report
}
