#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Data model for tract-level green space accounting.
//!
//! These types describe what flows between the pipeline stages: the
//! percentile levels used as vegetation cutoffs, land-use codes and the
//! per-year schemas that enumerate them, the grouped (code, area) sums
//! produced for each census tract, and the flat rows written to CSV.
//! They carry no geometry or pixel data so that every crate can share
//! them without pulling in the geospatial stack.

pub mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use schema::{ImageryProfile, LandUseSchema};

/// A percentile level (0–100) of the vegetation index distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentile(u8);

impl Percentile {
    /// The five cutoffs evaluated for every year.
    pub const STANDARD: [Self; 5] = [Self(70), Self(75), Self(80), Self(85), Self(90)];

    /// Creates a percentile level, rejecting values above 100.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= 100 { Some(Self(value)) } else { None }
    }

    /// The level as an integer in `0..=100`.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The level as a fraction in `[0, 1]`.
    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl TryFrom<u8> for Percentile {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("percentile {value} is outside 0..=100"))
    }
}

impl From<Percentile> for u8 {
    fn from(value: Percentile) -> Self {
        value.0
    }
}

impl std::str::FromStr for Percentile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .trim_start_matches('p')
            .trim_end_matches("th")
            .parse()
            .map_err(|e| format!("invalid percentile '{s}': {e}"))?;
        Self::try_from(value)
    }
}

impl fmt::Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A categorical land-use code from a year-specific survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandUseCode(pub u32);

impl fmt::Display for LandUseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summed green area for one land-use code inside one tract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandUseArea {
    /// Land-use category of the summed pixels.
    pub code: LandUseCode,
    /// Green area in square meters.
    pub area_m2: f64,
}

/// Zonal result for one tract at one threshold.
///
/// `groups` holds one entry per land-use code found among the tract's green
/// pixels. A code absent from the list means zero green area of that
/// category, and an empty list is a valid result for a tract with no
/// qualifying pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedAggregate {
    /// Tract identifier.
    pub cluster_id: String,
    /// `(code, area)` pairs in ascending code order.
    pub groups: Vec<LandUseArea>,
}

impl GroupedAggregate {
    /// Total green area across all codes.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.groups.iter().map(|g| g.area_m2).sum()
    }
}

/// One exported table row: a tract and one value per schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRow {
    /// Tract identifier.
    pub cluster_id: String,
    /// Green area in m² per schema column, in schema order. Missing
    /// categories are `0.0`, never empty.
    pub values: Vec<f64>,
}

/// Identifies one (year, percentile) execution of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    /// Survey year of the land-use schema and imagery window.
    pub year: u16,
    /// Vegetation index percentile used as the green cutoff.
    pub percentile: Percentile,
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.percentile)
    }
}

/// Pipeline stage, used to label failures.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Loading project inputs (layers, catalogs, schemas).
    Inputs,
    /// Building the cloud-light composite.
    Composite,
    /// Computing the vegetation index.
    Index,
    /// Selecting the percentile threshold.
    Threshold,
    /// Generating the binary green mask.
    Mask,
    /// Rasterizing the land-use layer.
    Rasterize,
    /// Multiplying the mask by pixel area and stacking land use.
    Accumulate,
    /// Summing area per tract and land-use code.
    Aggregate,
    /// Flattening rows and writing the CSV table.
    Export,
}
