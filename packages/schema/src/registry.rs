//! Compile-time registry of the default land-use schemas.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Supporting a new survey year means adding a TOML file in `schemas/` and
//! a corresponding entry here.

use greenspace_models::LandUseSchema;

use crate::parse_schema_toml;

/// Number of registered schemas. Enforced by a test.
#[cfg(test)]
const EXPECTED_SCHEMA_COUNT: usize = 3;

/// Embedded TOML schema definitions.
const SCHEMA_TOMLS: &[(&str, &str)] = &[
    ("lu1990", include_str!("../schemas/lu1990.toml")),
    ("lu2000", include_str!("../schemas/lu2000.toml")),
    ("lu2015", include_str!("../schemas/lu2015.toml")),
];

/// Returns all registered schemas in ascending year order.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse or validate. Since these
/// are compile-time constants, failures indicate a development error and
/// are caught by the tests below.
#[must_use]
pub fn all_schemas() -> Vec<LandUseSchema> {
    SCHEMA_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_schema_toml(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse land-use schema '{name}': {e}"))
        })
        .collect()
}

/// Returns the embedded schema for `year`, if one is registered.
#[must_use]
pub fn schema_for_year(year: u16) -> Option<LandUseSchema> {
    all_schemas().into_iter().find(|s| s.year == year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenspace_models::LandUseCode;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_schemas() {
        let schemas = all_schemas();
        assert_eq!(
            schemas.len(),
            EXPECTED_SCHEMA_COUNT,
            "Expected {EXPECTED_SCHEMA_COUNT} schemas, found {}. \
             Update EXPECTED_SCHEMA_COUNT after adding/removing schemas.",
            schemas.len()
        );
    }

    #[test]
    fn schema_years_are_unique() {
        let mut seen = BTreeSet::new();
        for schema in &all_schemas() {
            assert!(seen.insert(schema.year), "Duplicate schema year {}", schema.year);
        }
    }

    #[test]
    fn code_counts_match_export_lists() {
        assert_eq!(schema_for_year(1990).unwrap().codes.len(), 47);
        assert_eq!(schema_for_year(2000).unwrap().codes.len(), 47);
        assert_eq!(schema_for_year(2015).unwrap().codes.len(), 56);
        assert!(schema_for_year(1995).is_none());
    }

    #[test]
    fn lu1990_columns_are_literal_landuse_codes() {
        let schema = schema_for_year(1990).unwrap();
        let columns = schema.columns();
        assert_eq!(columns.first().map(String::as_str), Some("LANDUSE1110"));
        assert_eq!(columns.last().map(String::as_str), Some("LANDUSE9999"));
        assert!(columns.iter().all(|c| c.starts_with("LANDUSE") && !c.contains("_n")));
        assert!(schema.contains(LandUseCode(2000)));
        assert!(!schema.contains(LandUseCode(2100)));
    }

    #[test]
    fn later_years_use_renumbered_attribute() {
        for year in [2000, 2015] {
            let schema = schema_for_year(year).unwrap();
            assert_eq!(schema.attribute, "LANDUSE_n");
            assert!(schema.columns().iter().all(|c| c.starts_with("LANDUSE_n")));
        }
    }

    #[test]
    fn imagery_profiles_match_sensor_generation() {
        let tm = schema_for_year(1990).unwrap().imagery;
        assert_eq!((tm.nir_band.as_str(), tm.red_band.as_str()), ("B4", "B3"));
        assert_eq!(tm.tag, "L5");

        let oli = schema_for_year(2015).unwrap().imagery;
        assert_eq!((oli.nir_band.as_str(), oli.red_band.as_str()), ("B5", "B4"));
        assert_eq!(oli.tag, "L8");

        // The 2000 grid is defined by a 2001 acquisition.
        let etm_era = schema_for_year(2000).unwrap().imagery;
        assert_eq!(etm_era.reference_scene, "LT05_022031_20010710");
    }
}
