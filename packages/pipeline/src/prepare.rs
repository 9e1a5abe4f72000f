//! Inputs shared by every run, and the per-year work shared by its
//! percentiles.

use geo::{BoundingRect, MultiPolygon, Rect, coord};
use greenspace_imagery::{
    ImageryError, SceneCatalog, ThresholdSampler, TiffSceneLoader, build_composite,
    normalized_difference,
};
use greenspace_models::{LandUseSchema, Stage};
use greenspace_raster::{GridSpec, Raster, pixel_area};
use greenspace_spatial::{
    LandUseLayer, SpatialError, TractIndex, TractLayer, load_study_area, rasterize_land_use,
};

use crate::config::{ProjectConfig, YearInputs};
use crate::error::StageContext;
use crate::{PipelineError, ProgressCallback};

/// Vector inputs loaded once per project.
pub struct SharedInputs {
    /// Valid tracts plus the features that were rejected.
    pub tracts: TractLayer,
    /// R-tree over the valid tracts.
    pub tract_index: TractIndex,
    /// Merged study area.
    pub study_area: MultiPolygon<f64>,
}

impl SharedInputs {
    /// Loads the tract layer and the study area.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if either layer cannot be read or holds
    /// nothing usable.
    pub fn load(config: &ProjectConfig) -> Result<Self, SpatialError> {
        let tracts = TractLayer::load(&config.inputs.tracts)?;
        let tract_index = TractIndex::new(&tracts.tracts);
        let study_area = load_study_area(&config.inputs.study_area)?;
        Ok(Self {
            tracts,
            tract_index,
            study_area,
        })
    }

    /// Bounding box of the study area and every tract, or `None` when
    /// both are empty.
    #[must_use]
    pub fn extent(&self) -> Option<Rect<f64>> {
        std::iter::once(self.study_area.bounding_rect())
            .chain(self.tracts.tracts.iter().map(|t| t.geometry.bounding_rect()))
            .flatten()
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }
}

/// Rasters and samples computed once per year and read by every
/// percentile run of that year.
pub struct PreparedYear {
    /// The year's land-use schema.
    pub schema: LandUseSchema,
    /// Working grid.
    pub grid: GridSpec,
    /// Scenes that went into the composite.
    pub scenes_used: Vec<String>,
    /// Vegetation index on the working grid.
    pub index: Raster<f32>,
    /// Valid index values inside the study area.
    pub sampler: ThresholdSampler,
    /// Study-area pixels without a valid index value.
    pub uncovered_study_area_pixels: usize,
    /// Land-use code per pixel.
    pub land_use: Raster<u32>,
    /// Ground area per pixel in m².
    pub pixel_area: Raster<f64>,
}

/// Builds the composite, index, threshold sample, land-use raster, and
/// pixel areas for one year.
///
/// # Errors
///
/// Returns [`PipelineError`] labelled with the failing stage and no
/// percentile, since every percentile of the year depends on this work.
pub fn prepare_year(
    config: &ProjectConfig,
    inputs: &YearInputs,
    shared: &SharedInputs,
    progress: &dyn ProgressCallback,
) -> Result<PreparedYear, PipelineError> {
    let year = inputs.year;

    progress.set_message(format!("{year}: loading inputs"));
    let schema = inputs.resolve_schema().at(year, None, Stage::Inputs)?;
    let catalog = SceneCatalog::load(&inputs.scenes).at(year, None, Stage::Inputs)?;
    let land_use_layer =
        LandUseLayer::load(&inputs.land_use, &schema.attribute).at(year, None, Stage::Inputs)?;
    let extent = shared
        .extent()
        .ok_or_else(|| SpatialError::EmptyLayer {
            layer: config.inputs.study_area.display().to_string(),
        })
        .at(year, None, Stage::Inputs)?;

    progress.set_message(format!("{year}: compositing"));
    let profile = &schema.imagery;
    let grid = catalog
        .working_grid(profile, &extent)
        .at(year, None, Stage::Composite)?;
    let scenes = catalog
        .select(profile, &extent)
        .at(year, None, Stage::Composite)?;
    log::info!(
        "{year}: {} {} scenes in {}..{}",
        scenes.len(),
        profile.collection,
        profile.window_start,
        profile.window_end
    );
    let loader = TiffSceneLoader::new(&catalog);
    let composite = build_composite(
        &scenes,
        &loader,
        &grid,
        &[profile.nir_band.as_str(), profile.red_band.as_str()],
        config.cloud_score_range,
    )
    .at(year, None, Stage::Composite)?;

    progress.set_message(format!("{year}: vegetation index"));
    let (Some(nir), Some(red)) = (
        composite.band(&profile.nir_band),
        composite.band(&profile.red_band),
    ) else {
        return Err(ImageryError::InsufficientImagery {
            reason: "composite is missing the NIR or red band".to_string(),
        })
        .at(year, None, Stage::Composite);
    };
    let index = normalized_difference(nir, red).at(year, None, Stage::Index)?;

    let sampler = ThresholdSampler::sample(&index, &shared.study_area, config.min_sample_pixels)
        .at(year, None, Stage::Threshold)?;
    let uncovered = sampler.missing_pixels;
    if uncovered > 0 {
        #[allow(clippy::cast_precision_loss)]
        let fraction = uncovered as f64 / (uncovered + sampler.len()) as f64;
        if fraction > config.max_uncovered_fraction {
            return Err(ImageryError::InsufficientImagery {
                reason: format!(
                    "{uncovered} study-area pixels ({:.1}%) have no composite value, limit is {:.1}%",
                    fraction * 100.0,
                    config.max_uncovered_fraction * 100.0
                ),
            })
            .at(year, None, Stage::Composite);
        }
        log::warn!("{year}: {uncovered} study-area pixels have no valid index value");
    }

    progress.set_message(format!("{year}: rasterizing land use"));
    let land_use = rasterize_land_use(&land_use_layer, &grid);
    let pixel_area = pixel_area(&grid);

    log::info!(
        "{year}: prepared {}x{} grid from {} scenes, {} threshold samples",
        grid.rows,
        grid.cols,
        composite.scenes_used.len(),
        sampler.len()
    );

    Ok(PreparedYear {
        schema,
        grid,
        scenes_used: composite.scenes_used,
        index,
        sampler,
        uncovered_study_area_pixels: uncovered,
        land_use,
        pixel_area,
    })
}
