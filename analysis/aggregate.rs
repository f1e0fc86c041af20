//! Drug × timepoint aggregation.
//!
//! Buckets the combined records by treatment and elapsed time and derives
//! the pivoted mean / SEM / count matrices the charts are drawn from. Each
//! cell is computed from exactly the rows matching that drug and timepoint;
//! the tables are pure views with no lifecycle of their own.

use crate::data::{CombinedData, TrialRecord};
use crate::stats;
use itertools::Itertools;
use ndarray::Array2;
use std::collections::HashMap;

/// The longitudinal measurement an aggregate is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    TumorVolume,
    MetastaticSites,
}

impl Measure {
    fn value(self, record: &TrialRecord) -> Option<f64> {
        match self {
            Measure::TumorVolume => record.tumor_volume,
            Measure::MetastaticSites => record.metastatic_sites,
        }
    }
}

/// A pivoted drug × timepoint matrix: rows are timepoints in ascending
/// order, columns are drugs in lexicographic order. `NaN` marks a cell with
/// no matching rows.
#[derive(Debug, Clone)]
pub struct ResponseTable {
    pub drugs: Vec<String>,
    pub timepoints: Vec<f64>,
    pub values: Array2<f64>,
}

impl ResponseTable {
    pub fn get(&self, timepoint_idx: usize, drug_idx: usize) -> f64 {
        self.values[[timepoint_idx, drug_idx]]
    }

    /// The (timepoint, value) points of one drug's series, skipping empty
    /// cells.
    pub fn series(&self, drug_idx: usize) -> Vec<(f64, f64)> {
        self.timepoints
            .iter()
            .enumerate()
            .filter_map(|(t, &time)| {
                let v = self.get(t, drug_idx);
                v.is_finite().then_some((time, v))
            })
            .collect()
    }
}

/// Percent change of a drug's mean response over the treatment window.
#[derive(Debug, Clone, PartialEq)]
pub struct DrugChange {
    pub drug: String,
    pub percent: f64,
}

/// The combined records bucketed into drug × timepoint cells for one
/// measure. Records missing the drug, the timepoint, or the measure itself
/// (outer-join orphans, empty cells) are excluded from every bucket.
#[derive(Debug)]
pub struct GroupedMeasurements {
    drugs: Vec<String>,
    timepoints: Vec<f64>,
    cells: Vec<Vec<Vec<f64>>>,
}

impl GroupedMeasurements {
    pub fn from_records(data: &CombinedData, measure: Measure) -> Self {
        let mut triples: Vec<(&str, f64, f64)> = Vec::new();
        for record in &data.records {
            let (Some(drug), Some(timepoint), Some(value)) =
                (record.drug.as_deref(), record.timepoint, measure.value(record))
            else {
                continue;
            };
            // -0.0 and 0.0 are the same day; normalize so the sort order
            // and the bucket lookup below agree.
            triples.push((drug, timepoint + 0.0, value));
        }

        let drugs: Vec<String> = triples
            .iter()
            .map(|(drug, _, _)| (*drug).to_string())
            .sorted()
            .dedup()
            .collect();
        let timepoints: Vec<f64> = triples
            .iter()
            .map(|(_, timepoint, _)| *timepoint)
            .sorted_by(f64::total_cmp)
            .dedup_by(|a, b| a.total_cmp(b).is_eq())
            .collect();

        let drug_index: HashMap<&str, usize> = drugs
            .iter()
            .enumerate()
            .map(|(i, drug)| (drug.as_str(), i))
            .collect();

        let mut cells = vec![vec![Vec::new(); drugs.len()]; timepoints.len()];
        for (drug, timepoint, value) in triples {
            let t = timepoints
                .binary_search_by(|probe| probe.total_cmp(&timepoint))
                .expect("timepoint was collected above");
            let d = drug_index[drug];
            cells[t][d].push(value);
        }

        GroupedMeasurements {
            drugs,
            timepoints,
            cells,
        }
    }

    /// Mean of each cell's observations.
    pub fn mean_table(&self) -> ResponseTable {
        self.table_with(|values| stats::mean(values).unwrap_or(f64::NAN))
    }

    /// Standard error of the mean of each cell's observations.
    pub fn sem_table(&self) -> ResponseTable {
        self.table_with(|values| stats::sem(values).unwrap_or(f64::NAN))
    }

    /// Number of observations per cell, the survival proxy of the source
    /// analysis: subjects that died stop contributing rows.
    pub fn count_table(&self) -> ResponseTable {
        self.table_with(|values| values.len() as f64)
    }

    fn table_with(&self, cell_stat: impl Fn(&[f64]) -> f64) -> ResponseTable {
        let mut values = Array2::from_elem((self.timepoints.len(), self.drugs.len()), f64::NAN);
        for (t, row) in self.cells.iter().enumerate() {
            for (d, cell) in row.iter().enumerate() {
                values[[t, d]] = cell_stat(cell);
            }
        }
        ResponseTable {
            drugs: self.drugs.clone(),
            timepoints: self.timepoints.clone(),
            values,
        }
    }
}

/// Converts a count table into surviving percentages: each drug's counts are
/// scaled against the largest cohort observed for that drug. A timepoint the
/// drug was never measured at has a zero count and stays an empty cell, so a
/// series whose schedule ends early ends rather than plunging to 0 %.
pub fn survival_table(counts: &ResponseTable) -> ResponseTable {
    let mut values = counts.values.clone();
    for d in 0..counts.drugs.len() {
        let baseline = (0..counts.timepoints.len())
            .map(|t| counts.get(t, d))
            .filter(|v| v.is_finite())
            .fold(0.0f64, f64::max);
        for t in 0..counts.timepoints.len() {
            let count = counts.get(t, d);
            values[[t, d]] = if baseline > 0.0 && count > 0.0 {
                count / baseline * 100.0
            } else {
                f64::NAN
            };
        }
    }
    ResponseTable {
        drugs: counts.drugs.clone(),
        timepoints: counts.timepoints.clone(),
        values,
    }
}

/// Percent change of each drug's mean response between the first and last
/// populated timepoint. Drugs with fewer than two populated timepoints, or
/// with an undefined change (zero baseline), are skipped.
pub fn percent_change_by_drug(mean: &ResponseTable) -> Vec<DrugChange> {
    let mut changes = Vec::with_capacity(mean.drugs.len());
    for (d, drug) in mean.drugs.iter().enumerate() {
        let series = mean.series(d);
        let (Some((_, first)), Some((_, last))) = (series.first(), series.last()) else {
            continue;
        };
        if series.len() < 2 {
            continue;
        }
        let Some(percent) = stats::percent_change(*first, *last) else {
            continue;
        };
        changes.push(DrugChange {
            drug: drug.clone(),
            percent,
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrialRecord;
    use approx::assert_abs_diff_eq;

    fn record(
        id: &str,
        drug: Option<&str>,
        timepoint: Option<f64>,
        tumor: Option<f64>,
        mets: Option<f64>,
    ) -> TrialRecord {
        TrialRecord {
            mouse_id: Some(id.to_string()),
            drug: drug.map(str::to_string),
            dosage: None,
            timepoint,
            tumor_volume: tumor,
            metastatic_sites: mets,
        }
    }

    fn sample_data() -> CombinedData {
        CombinedData {
            records: vec![
                record("m1", Some("Capomulin"), Some(0.0), Some(45.0), Some(0.0)),
                record("m2", Some("Capomulin"), Some(0.0), Some(45.0), Some(0.0)),
                record("m1", Some("Capomulin"), Some(5.0), Some(43.0), Some(0.0)),
                record("m2", Some("Capomulin"), Some(5.0), Some(41.0), Some(1.0)),
                record("m3", Some("Placebo"), Some(0.0), Some(45.0), Some(0.0)),
                record("m4", Some("Placebo"), Some(0.0), Some(47.0), Some(0.0)),
                record("m3", Some("Placebo"), Some(5.0), Some(51.0), Some(2.0)),
                // outer-join orphans and empty cells must not contribute
                record("m9", Some("Placebo"), None, None, None),
                record("m5", None, Some(5.0), Some(99.0), Some(9.0)),
                record("m3", Some("Placebo"), Some(5.0), None, Some(1.0)),
            ],
        }
    }

    #[test]
    fn mean_table_matches_manual_computation() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::TumorVolume);
        let mean = grouped.mean_table();

        assert_eq!(mean.drugs, vec!["Capomulin", "Placebo"]);
        assert_eq!(mean.timepoints, vec![0.0, 5.0]);
        assert_abs_diff_eq!(mean.get(0, 0), 45.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.get(1, 0), 42.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.get(0, 1), 46.0, epsilon = 1e-12);
        // The null tumor volume at (Placebo, 5) is excluded from the mean.
        assert_abs_diff_eq!(mean.get(1, 1), 51.0, epsilon = 1e-12);
    }

    #[test]
    fn sem_table_matches_manual_computation() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::TumorVolume);
        let sem = grouped.sem_table();

        // Capomulin at day 5: values [43, 41], std = sqrt(2), sem = 1.
        assert_abs_diff_eq!(sem.get(1, 0), 1.0, epsilon = 1e-12);
        // Placebo at day 5 has a single value, so its SEM is undefined.
        assert!(sem.get(1, 1).is_nan());
    }

    #[test]
    fn count_table_counts_only_present_measurements() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::MetastaticSites);
        let counts = grouped.count_table();

        assert_abs_diff_eq!(counts.get(0, 0), 2.0, epsilon = 1e-12);
        // Both Placebo day-5 records carry a metastatic count.
        assert_abs_diff_eq!(counts.get(1, 1), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn survival_table_scales_against_largest_cohort() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::MetastaticSites);
        let survival = survival_table(&grouped.count_table());

        assert_abs_diff_eq!(survival.get(0, 0), 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(survival.get(1, 0), 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(survival.get(0, 1), 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(survival.get(1, 1), 100.0, epsilon = 1e-12);
    }

    #[test]
    fn survival_table_reflects_subject_dropout() {
        let data = CombinedData {
            records: vec![
                record("m1", Some("Ketapril"), Some(0.0), Some(45.0), Some(0.0)),
                record("m2", Some("Ketapril"), Some(0.0), Some(45.0), Some(0.0)),
                record("m3", Some("Ketapril"), Some(0.0), Some(45.0), Some(0.0)),
                record("m4", Some("Ketapril"), Some(0.0), Some(45.0), Some(0.0)),
                record("m1", Some("Ketapril"), Some(5.0), Some(47.0), Some(1.0)),
                record("m2", Some("Ketapril"), Some(5.0), Some(48.0), Some(0.0)),
                record("m3", Some("Ketapril"), Some(5.0), Some(49.0), Some(2.0)),
            ],
        };
        let grouped = GroupedMeasurements::from_records(&data, Measure::MetastaticSites);
        let survival = survival_table(&grouped.count_table());

        assert_abs_diff_eq!(survival.get(0, 0), 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(survival.get(1, 0), 75.0, epsilon = 1e-12);
    }

    #[test]
    fn survival_table_leaves_unmeasured_timepoints_empty() {
        // Ceftamin's schedule ends at day 5 while Ketapril runs to day 10;
        // the shorter series must end, not drop to 0 %.
        let data = CombinedData {
            records: vec![
                record("m1", Some("Ketapril"), Some(0.0), Some(45.0), Some(0.0)),
                record("m1", Some("Ketapril"), Some(5.0), Some(46.0), Some(0.0)),
                record("m1", Some("Ketapril"), Some(10.0), Some(47.0), Some(1.0)),
                record("m2", Some("Ceftamin"), Some(0.0), Some(45.0), Some(0.0)),
                record("m2", Some("Ceftamin"), Some(5.0), Some(44.0), Some(0.0)),
            ],
        };
        let grouped = GroupedMeasurements::from_records(&data, Measure::MetastaticSites);
        let survival = survival_table(&grouped.count_table());

        assert_eq!(survival.drugs, vec!["Ceftamin", "Ketapril"]);
        assert!(survival.get(2, 0).is_nan());
        assert_abs_diff_eq!(survival.get(2, 1), 100.0, epsilon = 1e-12);
        // The rendered series ends at the last measured timepoint.
        assert_eq!(survival.series(0), vec![(0.0, 100.0), (5.0, 100.0)]);
    }

    #[test]
    fn negative_zero_timepoint_shares_the_zero_bucket() {
        let data = CombinedData {
            records: vec![
                record("m1", Some("Capomulin"), Some(0.0), Some(45.0), Some(0.0)),
                record("m2", Some("Capomulin"), Some(-0.0), Some(47.0), Some(0.0)),
            ],
        };
        let grouped = GroupedMeasurements::from_records(&data, Measure::TumorVolume);
        let mean = grouped.mean_table();

        assert_eq!(mean.timepoints.len(), 1);
        assert_abs_diff_eq!(mean.get(0, 0), 46.0, epsilon = 1e-12);
    }

    #[test]
    fn series_skips_empty_cells() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::TumorVolume);
        let sem = grouped.sem_table();
        // Placebo SEM is only defined at day 0.
        assert_eq!(sem.series(1).len(), 1);
    }

    #[test]
    fn percent_change_uses_first_and_last_populated_timepoint() {
        let grouped = GroupedMeasurements::from_records(&sample_data(), Measure::TumorVolume);
        let changes = percent_change_by_drug(&grouped.mean_table());

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].drug, "Capomulin");
        // 45 -> 42 over the window.
        assert_abs_diff_eq!(changes[0].percent, -3.0 / 45.0 * 100.0, epsilon = 1e-12);
        assert_eq!(changes[1].drug, "Placebo");
        assert_abs_diff_eq!(changes[1].percent, 5.0 / 46.0 * 100.0, epsilon = 1e-12);
    }

    #[test]
    fn percent_change_skips_single_timepoint_drugs() {
        let data = CombinedData {
            records: vec![record(
                "m1",
                Some("Ramicane"),
                Some(0.0),
                Some(45.0),
                Some(0.0),
            )],
        };
        let grouped = GroupedMeasurements::from_records(&data, Measure::TumorVolume);
        assert!(percent_change_by_drug(&grouped.mean_table()).is_empty());
    }

    #[test]
    fn percent_change_skips_zero_baseline_drugs() {
        let data = CombinedData {
            records: vec![
                record("m1", Some("Naftisol"), Some(0.0), Some(0.0), Some(0.0)),
                record("m1", Some("Naftisol"), Some(5.0), Some(3.0), Some(0.0)),
                record("m2", Some("Zoniferol"), Some(0.0), Some(45.0), Some(0.0)),
                record("m2", Some("Zoniferol"), Some(5.0), Some(54.0), Some(0.0)),
            ],
        };
        let grouped = GroupedMeasurements::from_records(&data, Measure::TumorVolume);
        let changes = percent_change_by_drug(&grouped.mean_table());

        // Naftisol's zero baseline makes its change undefined; only the
        // well-defined drug is reported.
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].drug, "Zoniferol");
        assert_abs_diff_eq!(changes[0].percent, 20.0, epsilon = 1e-12);
    }
}
