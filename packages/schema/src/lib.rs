#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Versioned per-year land-use code schemas.
//!
//! The code list of each survey year is data, not pipeline logic. The
//! default schemas are TOML files embedded at compile time (see
//! [`registry`]); a project may point any year at an external schema file
//! instead, which goes through the same parsing and validation.

pub mod registry;

use std::collections::BTreeSet;
use std::path::Path;

use greenspace_models::LandUseSchema;
use thiserror::Error;

pub use registry::{all_schemas, schema_for_year};

/// Errors that can occur while loading or validating a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// I/O error reading a schema file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The schema parsed but is not usable.
    #[error("Invalid schema for {year}: {message}")]
    Invalid {
        /// Year named in the schema.
        year: u16,
        /// Description of what went wrong.
        message: String,
    },
}

/// Parses and validates a schema from TOML text.
///
/// # Errors
///
/// Returns [`SchemaError`] if the TOML is malformed or the schema fails
/// [`validate`].
pub fn parse_schema_toml(text: &str) -> Result<LandUseSchema, SchemaError> {
    let schema: LandUseSchema = toml::from_str(text)?;
    validate(&schema)?;
    Ok(schema)
}

/// Loads and validates a schema from a TOML file on disk.
///
/// # Errors
///
/// Returns [`SchemaError`] if the file cannot be read, parsed, or validated.
pub fn load_schema_file(path: &Path) -> Result<LandUseSchema, SchemaError> {
    let text = std::fs::read_to_string(path)?;
    let schema = parse_schema_toml(&text)?;
    log::debug!(
        "Loaded {} schema from {} ({} codes)",
        schema.year,
        path.display(),
        schema.codes.len()
    );
    Ok(schema)
}

/// Checks the structural invariants of a schema: a non-empty attribute
/// name, at least one code, no duplicate codes (each column must be
/// unique), and a non-empty imagery window.
///
/// # Errors
///
/// Returns [`SchemaError::Invalid`] describing the first violation found.
pub fn validate(schema: &LandUseSchema) -> Result<(), SchemaError> {
    let invalid = |message: String| SchemaError::Invalid {
        year: schema.year,
        message,
    };

    if schema.attribute.trim().is_empty() {
        return Err(invalid("attribute name is empty".to_string()));
    }
    if schema.codes.is_empty() {
        return Err(invalid("code list is empty".to_string()));
    }

    let mut seen = BTreeSet::new();
    for code in &schema.codes {
        if !seen.insert(*code) {
            return Err(invalid(format!("duplicate code {code}")));
        }
    }

    let imagery = &schema.imagery;
    if imagery.window_end <= imagery.window_start {
        return Err(invalid(format!(
            "imagery window {}..{} is empty",
            imagery.window_start, imagery.window_end
        )));
    }
    if imagery.nir_band == imagery.red_band {
        return Err(invalid(format!(
            "NIR and red bands are both {}",
            imagery.nir_band
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        year = 2000
        name = "Test"
        attribute = "LANDUSE_n"
        column_prefix = "LANDUSE_n"
        codes = [1110, 1120]

        [imagery]
        collection = "LT05"
        tag = "L5"
        nir_band = "B4"
        red_band = "B3"
        window_start = "2000-06-01"
        window_end = "2000-08-31"
        reference_scene = "LT05_022031_20010710"
    "#;

    #[test]
    fn parses_valid_schema() {
        let schema = parse_schema_toml(VALID).unwrap();
        assert_eq!(schema.year, 2000);
        assert_eq!(schema.codes.len(), 2);
    }

    #[test]
    fn rejects_duplicate_codes() {
        let text = VALID.replace("[1110, 1120]", "[1110, 1110]");
        let err = parse_schema_toml(&text).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { year: 2000, .. }));
        assert!(err.to_string().contains("duplicate code 1110"));
    }

    #[test]
    fn rejects_empty_code_list() {
        let text = VALID.replace("[1110, 1120]", "[]");
        assert!(matches!(
            parse_schema_toml(&text),
            Err(SchemaError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_inverted_window() {
        let text = VALID.replace("window_end = \"2000-08-31\"", "window_end = \"2000-05-01\"");
        assert!(matches!(
            parse_schema_toml(&text),
            Err(SchemaError::Invalid { .. })
        ));
    }

    #[test]
    fn loads_schema_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, VALID).unwrap();
        let schema = load_schema_file(&path).unwrap();
        assert_eq!(schema.attribute, "LANDUSE_n");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_schema_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SchemaError::Io(_)));
    }
}
