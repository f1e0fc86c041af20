//! # Data Loading and Joining Module
//!
//! This module is the exclusive entry point for user-provided data. It reads
//! the two trial CSV files (subject-drug assignments and longitudinal
//! observations), validates them against the expected schema, outer-joins
//! them on the subject identifier, and hands plain owned records to the
//! aggregation core.
//!
//! - Strict schema: column names are not configurable. The loader enforces
//!   the headers the trial exports use (`Mouse ID`, `Drug`, `Timepoint`, ...)
//!   which eliminates a class of configuration errors.
//! - User-centric errors: failures are assumed to be user-input errors and
//!   the `DataError` enum is designed to give actionable feedback.
//! - Polars is used strictly as the I/O and join layer; everything downstream
//!   operates on the owned `TrialRecord` structures returned here.

use log::info;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Subject identifier column shared by both input files.
pub const COL_MOUSE_ID: &str = "Mouse ID";
/// Assigned treatment column in the subject-drug file.
pub const COL_DRUG: &str = "Drug";
/// Optional dosage column in the subject-drug file.
pub const COL_DOSAGE: &str = "Dosage";
/// Elapsed time column (days) in the observation file.
pub const COL_TIMEPOINT: &str = "Timepoint";
/// Tumor volume column in the observation file.
pub const COL_TUMOR_VOLUME: &str = "Tumor Volume (mm3)";
/// Metastatic site count column in the observation file.
pub const COL_METASTATIC_SITES: &str = "Metastatic Sites";

/// A comprehensive error type for all data loading and validation failures.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "The required column '{column}' was not found in '{file}'. Please check spelling and case."
    )]
    ColumnNotFound { column: String, file: String },
    #[error("The input file '{0}' contains a header but no data rows.")]
    EmptyInput(String),
}

/// One row of the combined (outer-joined) relation.
///
/// Measurement fields are `Option` because an outer join preserves rows that
/// are missing on either side: a subject with an assignment but no
/// observations carries a null timepoint, and an observation for an unknown
/// subject carries a null drug.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub mouse_id: Option<String>,
    pub drug: Option<String>,
    pub dosage: Option<f64>,
    pub timepoint: Option<f64>,
    pub tumor_volume: Option<f64>,
    pub metastatic_sites: Option<f64>,
}

/// The combined dataset, one record per (subject, timepoint) pair.
#[derive(Debug)]
pub struct CombinedData {
    pub records: Vec<TrialRecord>,
}

impl CombinedData {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct subject identifiers in the combined relation.
    pub fn subject_count(&self) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.mouse_id.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Loads and validates the subject-drug assignment file.
pub fn load_mouse_data(path: &Path) -> Result<DataFrame, DataError> {
    let df = read_csv(path)?;
    require_columns(&df, path, &[COL_MOUSE_ID, COL_DRUG])?;
    info!(
        "loaded {} subject-drug assignments from '{}'",
        df.height(),
        path.display()
    );
    Ok(df)
}

/// Loads and validates the longitudinal observation file.
pub fn load_clinical_data(path: &Path) -> Result<DataFrame, DataError> {
    let df = read_csv(path)?;
    require_columns(
        &df,
        path,
        &[
            COL_MOUSE_ID,
            COL_TIMEPOINT,
            COL_TUMOR_VOLUME,
            COL_METASTATIC_SITES,
        ],
    )?;
    info!(
        "loaded {} observations from '{}'",
        df.height(),
        path.display()
    );
    Ok(df)
}

/// Loads both input files and outer-joins them on the subject identifier.
///
/// Rows without a match on either side are preserved with missing
/// measurements, per outer-join semantics. The join key is coalesced so the
/// combined relation carries a single `Mouse ID` column.
pub fn load_combined(mouse_path: &Path, clinical_path: &Path) -> Result<CombinedData, DataError> {
    let mouse = load_mouse_data(mouse_path)?;
    let clinical = load_clinical_data(clinical_path)?;

    let combined = mouse
        .lazy()
        .join(
            clinical.lazy(),
            [col(COL_MOUSE_ID)],
            [col(COL_MOUSE_ID)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .collect()?;

    let n = combined.height();
    let mouse_ids = string_column(&combined, COL_MOUSE_ID)?;
    let drugs = string_column(&combined, COL_DRUG)?;
    let dosages = if has_column(&combined, COL_DOSAGE) {
        numeric_column(&combined, COL_DOSAGE)?
    } else {
        vec![None; n]
    };
    let timepoints = numeric_column(&combined, COL_TIMEPOINT)?;
    let tumor_volumes = numeric_column(&combined, COL_TUMOR_VOLUME)?;
    let metastatic_sites = numeric_column(&combined, COL_METASTATIC_SITES)?;

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        records.push(TrialRecord {
            mouse_id: mouse_ids[i].clone(),
            drug: drugs[i].clone(),
            dosage: dosages[i],
            timepoint: timepoints[i],
            tumor_volume: tumor_volumes[i],
            metastatic_sites: metastatic_sites[i],
        });
    }

    let data = CombinedData { records };
    info!(
        "combined relation has {} rows covering {} subjects",
        data.len(),
        data.subject_count()
    );
    Ok(data)
}

fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    let df = CsvReader::new(File::open(path)?)
        .with_options(CsvReadOptions::default().with_has_header(true))
        .finish()?;
    if df.height() == 0 {
        return Err(DataError::EmptyInput(path.display().to_string()));
    }
    Ok(df)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn require_columns(df: &DataFrame, path: &Path, required: &[&str]) -> Result<(), DataError> {
    for name in required {
        if !has_column(df, name) {
            return Err(DataError::ColumnNotFound {
                column: (*name).to_string(),
                file: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Extracts a column as owned strings, preserving nulls.
///
/// The column is cast to string first so a numeric subject identifier still
/// round-trips as text.
fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, DataError> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    let chunked = casted.as_materialized_series().str()?.rechunk();
    Ok(chunked
        .into_iter()
        .map(|value| value.map(|s| s.to_string()))
        .collect())
}

/// Extracts a column as `f64`, preserving nulls.
///
/// Cells that cannot be parsed as numbers become nulls rather than failures;
/// the aggregation layer treats them as missing measurements.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DataError> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    let chunked = casted.f64()?.rechunk();
    Ok(chunked.into_iter().collect())
}
