//! The linear analysis pipeline: load → join → aggregate → plot.

use crate::aggregate::{GroupedMeasurements, Measure, percent_change_by_drug, survival_table};
use crate::chart::{self, ChartError};
use crate::data::{self, DataError};
use crate::report::{self, ReportError};
use log::info;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs and outputs of one analysis run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mouse_data: PathBuf,
    pub clinical_data: PathBuf,
    pub out_dir: PathBuf,
    pub write_tables: bool,
}

/// What a run produced, for reporting back to the caller.
#[derive(Debug)]
pub struct RunSummary {
    pub subjects: usize,
    pub records: usize,
    pub outputs: Vec<PathBuf>,
}

/// Runs the full analysis: loads and joins the two input files, derives the
/// grouped aggregates, and renders the four charts (plus the aggregate
/// tables when requested) into the output directory.
pub fn run(config: &RunConfig) -> Result<RunSummary, PipelineError> {
    let combined = data::load_combined(&config.mouse_data, &config.clinical_data)?;
    fs::create_dir_all(&config.out_dir)?;

    let tumor = GroupedMeasurements::from_records(&combined, Measure::TumorVolume);
    let mets = GroupedMeasurements::from_records(&combined, Measure::MetastaticSites);

    let tumor_mean = tumor.mean_table();
    let tumor_sem = tumor.sem_table();
    let mets_mean = mets.mean_table();
    let mets_sem = mets.sem_table();
    let survival = survival_table(&mets.count_table());
    let changes = percent_change_by_drug(&tumor_mean);
    info!(
        "aggregated {} drugs across {} timepoints",
        tumor_mean.drugs.len(),
        tumor_mean.timepoints.len()
    );

    let mut outputs = Vec::new();

    let path = config.out_dir.join("tumor_response.svg");
    chart::tumor_response(&tumor_mean, &tumor_sem, &path)?;
    outputs.push(path);

    let path = config.out_dir.join("metastatic_spread.svg");
    chart::metastatic_spread(&mets_mean, &mets_sem, &path)?;
    outputs.push(path);

    let path = config.out_dir.join("survival_rate.svg");
    chart::survival_rate(&survival, &path)?;
    outputs.push(path);

    let path = config.out_dir.join("tumor_change.svg");
    chart::tumor_change(&changes, &path)?;
    outputs.push(path);

    if config.write_tables {
        let tables = [
            (&tumor_mean, "tumor_volume_mean.tsv"),
            (&tumor_sem, "tumor_volume_sem.tsv"),
            (&mets_mean, "metastatic_sites_mean.tsv"),
            (&mets_sem, "metastatic_sites_sem.tsv"),
            (&survival, "survival_rate.tsv"),
        ];
        for (table, name) in tables {
            let path = config.out_dir.join(name);
            report::write_table(table, &path)?;
            outputs.push(path);
        }
    }

    Ok(RunSummary {
        subjects: combined.subject_count(),
        records: combined.len(),
        outputs,
    })
}
