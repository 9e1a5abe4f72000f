#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Wide-table export of tract aggregates.
//!
//! Each tract's grouped `(code, area)` list becomes one row with a column
//! per code of the year's schema, in the schema's literal order. A code
//! missing from a tract's groups is written as `0`, never left empty.
//! Codes outside the schema are never merged into another column: they
//! are dropped with a warning or rejected, per [`SchemaPolicy`].

pub mod csv_writer;
pub mod flatten;

use greenspace_models::LandUseCode;
use thiserror::Error;

pub use csv_writer::{write_table, write_table_file};
pub use flatten::{FlatTable, LandUseAreas, SchemaPolicy, flatten_table};

/// Errors that can occur while flattening or writing a table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// I/O error writing the table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A grouped aggregate holds a code outside the year's schema.
    #[error("Land-use code {code} in tract {cluster_id} is not in the {year} schema")]
    SchemaMismatch {
        /// Schema year.
        year: u16,
        /// Tract holding the code.
        cluster_id: String,
        /// Offending code.
        code: LandUseCode,
    },
}
