//! TSV table reports.
//!
//! The source analysis previews every pivot table; here each aggregate can
//! be written out as a tab-separated file, one drug per column, one row per
//! timepoint. Empty cells are written as empty fields.

use crate::aggregate::ResponseTable;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes a drug × timepoint aggregate as a TSV file.
pub fn write_table(table: &ResponseTable, path: &Path) -> Result<(), ReportError> {
    let mut columns: Vec<Column> = Vec::with_capacity(table.drugs.len() + 1);
    columns.push(Series::new("Timepoint".into(), table.timepoints.clone()).into());
    for (d, drug) in table.drugs.iter().enumerate() {
        let cells: Vec<Option<f64>> = (0..table.timepoints.len())
            .map(|t| {
                let value = table.get(t, d);
                value.is_finite().then_some(value)
            })
            .collect();
        columns.push(Series::new(drug.as_str().into(), cells).into());
    }

    let mut df = DataFrame::new(columns)?;
    let file = File::create(path)?;
    CsvWriter::new(file)
        .with_separator(b'\t')
        .finish(&mut df)?;
    Ok(())
}
