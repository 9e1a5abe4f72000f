//! CSV output of flattened tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{ExportError, FlatTable};

/// Name of the key column.
pub const CLUSTER_ID_COLUMN: &str = "cluster_id";

/// Writes `table` as CSV: `cluster_id` then the land-use columns, one
/// line per row. Values use the shortest representation that reads back
/// to the same `f64`, so identical tables give identical bytes.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_table<W: Write>(table: &FlatTable, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record(
        std::iter::once(CLUSTER_ID_COLUMN).chain(table.columns.iter().map(String::as_str)),
    )?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.cluster_id.clone());
        record.extend(row.values.iter().map(ToString::to_string));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes `table` to `path`, creating parent directories. The file is
/// written next to its destination first and renamed into place, so a
/// failed run never leaves a truncated table behind.
///
/// # Errors
///
/// Returns [`ExportError`] if the directory, file, or rename fails.
pub fn write_table_file(table: &FlatTable, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let partial = path.with_extension("csv.partial");
    {
        let mut writer = BufWriter::new(File::create(&partial)?);
        write_table(table, &mut writer)?;
        writer.flush()?;
    }
    std::fs::rename(&partial, path)?;

    log::info!(
        "Wrote {} rows x {} columns to {}",
        table.rows.len(),
        table.columns.len() + 1,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::tests::{aggregate, schema};
    use crate::{SchemaPolicy, flatten_table};

    fn table() -> FlatTable {
        flatten_table(
            &[
                aggregate("17031010100", &[(1110, 900.0), (9999, 1350.25)]),
                aggregate("17031010200", &[]),
            ],
            &schema(),
            SchemaPolicy::Log,
        )
        .unwrap()
    }

    #[test]
    fn writes_header_and_zero_filled_rows() {
        let mut buf = Vec::new();
        write_table(&table(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "cluster_id,LANDUSE3100,LANDUSE1110,LANDUSE9999\n\
             17031010100,0,900,1350.25\n\
             17031010200,0,0,0\n"
        );
    }

    #[test]
    fn rewriting_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/LU1990_NDVI70thPer_L5.csv");

        write_table_file(&table(), &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_table_file(&table(), &path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(!path.with_extension("csv.partial").exists());
    }
}
