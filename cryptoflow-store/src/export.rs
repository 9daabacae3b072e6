//! CSV export of tables and analytics results for external chart renderers.
//!
//! Every export is a header row plus one record per row, serialized from the
//! row struct. Missing values are written as empty fields.

use std::path::Path;

use anyhow::{Context, Result};
use cryptoflow_core::normalize::NormalizedTable;
use serde::Serialize;

/// Export the normalized table as CSV.
///
/// Columns: date_key, price, volume, capitalization, instrument_id, quote_currency
pub fn export_table_csv(table: &NormalizedTable) -> Result<String> {
    let rows = table
        .rows()
        .context("failed to read rows from normalized table")?;
    export_rows_csv(&rows)
}

/// Export any serializable row set as CSV; field names become the header.
pub fn export_rows_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row).context("failed to serialize CSV record")?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write CSV text to `path`, creating parent directories.
pub fn write_csv(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
