//! Per-year land-use schema and imagery profile types.
//!
//! A [`LandUseSchema`] is versioned data rather than code: it names the
//! land-use attribute of that year's survey, the literal ordered list of
//! codes that become output columns, and the imagery settings (sensor,
//! band pair, summer window, reference scene) used to derive the
//! vegetation index for the same year.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{LandUseCode, Percentile};

/// Land-use code schema for one survey year, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandUseSchema {
    /// Survey year (e.g. `1990`).
    pub year: u16,
    /// Human-readable survey name.
    pub name: String,
    /// Property name on the land-use polygons holding the code.
    pub attribute: String,
    /// Prefix prepended to each code to build a column name.
    pub column_prefix: String,
    /// Valid codes in literal export column order.
    pub codes: Vec<LandUseCode>,
    /// Imagery settings for the same year.
    pub imagery: ImageryProfile,
}

impl LandUseSchema {
    /// Column name for a code (`column_prefix` + code).
    #[must_use]
    pub fn column_name(&self, code: LandUseCode) -> String {
        format!("{}{code}", self.column_prefix)
    }

    /// All land-use column names in export order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.codes.iter().map(|c| self.column_name(*c)).collect()
    }

    /// Position of `code` within the export column order.
    #[must_use]
    pub fn position(&self, code: LandUseCode) -> Option<usize> {
        self.codes.iter().position(|c| *c == code)
    }

    /// Whether `code` belongs to this year's schema.
    #[must_use]
    pub fn contains(&self, code: LandUseCode) -> bool {
        self.position(code).is_some()
    }

    /// Output file name for one percentile run, e.g.
    /// `LU1990_NDVI70thPer_L5.csv`.
    #[must_use]
    pub fn table_file_name(&self, percentile: Percentile) -> String {
        format!(
            "LU{}_NDVI{}thPer_{}.csv",
            self.year,
            percentile.value(),
            self.imagery.tag
        )
    }
}

/// Imagery settings for one survey year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryProfile {
    /// Scene collection identifier (e.g. `"LT05"`).
    pub collection: String,
    /// Short sensor tag used in output file names (e.g. `"L5"`).
    pub tag: String,
    /// Near-infrared band name.
    pub nir_band: String,
    /// Red band name.
    pub red_band: String,
    /// First acquisition date included.
    pub window_start: NaiveDate,
    /// First acquisition date excluded.
    pub window_end: NaiveDate,
    /// Scene whose projection defines the working CRS and scale.
    pub reference_scene: String,
}

impl ImageryProfile {
    /// Whether an acquisition date falls in `[window_start, window_end)`.
    #[must_use]
    pub fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.window_start && date < self.window_end
    }
}
