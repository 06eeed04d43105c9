//! Check that the samples submitted for the non-stool data types map onto
//! the clinical (StudyTrax) sheet, and explain the ones that do not.
//!
//! Unmapped samples are searched again after undoing common transcription
//! errors, then in every clinical id column and, for viromics, in the
//! tracking sheet.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 qc-sample-mapping -m MANIFEST.yaml --clinical hmp2_clinical.csv \
//!     --tracking broad_tracking.csv -c hmp2_project.yaml
//! ```
use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};

use super::ids::SUBSTITUTIONS;
use crate::common::sample_name;
use crate::config::ProjectConfig;
use crate::manifest::Manifest;
use crate::table::Table;

/// Data types whose samples are checked.
const QC_DATA_TYPES: &[&str] = &["MVX", "HTX", "RRBS", "SER", "HG"];

const CLINICAL_SEARCH_COLS: &[&str] = &["st_q13", "st_q12", "st_q10", "st_q4", "st_q17", "st_q11"];
const TRACKING_SEARCH_COLS: &[&str] = &[
    "Viromics",
    "MbX",
    "Proteomics",
    "Parent Sample A",
    "Parent Sample B",
    "DNA/RNA",
];

#[derive(Debug, Default, PartialEq)]
pub struct QcReport {
    pub data_type: String,
    pub mapped: BTreeSet<String>,
    /// (from, to, original ids found after the substitution)
    pub substituted: Vec<(String, String, BTreeSet<String>)>,
    /// Ids found in a clinical column other than the configured ones.
    pub wrong_column: BTreeMap<String, BTreeSet<String>>,
    /// Ids only found in the tracking sheet.
    pub tracking: BTreeMap<String, BTreeSet<String>>,
    pub missing: BTreeSet<String>,
}

/// Sample ids found in any of the given columns.
pub fn check_sample_mapping<S: AsRef<str>>(
    samples: &BTreeSet<String>,
    table: &Table,
    columns: &[S],
) -> BTreeSet<String> {
    columns
        .iter()
        .filter(|col| table.has_column(col.as_ref()))
        .flat_map(|col| table.column_values(col.as_ref()))
        .filter(|value| samples.contains(*value))
        .map(str::to_owned)
        .collect()
}

pub fn check_data_type(
    data_type: &str,
    samples: BTreeSet<String>,
    clinical: &Table,
    tracking: &Table,
    mapping_cols: &[String],
) -> QcReport {
    let mut report = QcReport {
        data_type: data_type.to_owned(),
        ..Default::default()
    };
    report.mapped = check_sample_mapping(&samples, clinical, mapping_cols);
    let mut missing: BTreeSet<String> = samples.difference(&report.mapped).cloned().collect();

    for (from, to) in SUBSTITUTIONS {
        // several ids can collapse onto the same variant
        let mut variants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for id in &missing {
            variants
                .entry(id.replace(from, to))
                .or_default()
                .insert(id.clone());
        }
        let keys = variants.keys().cloned().collect();
        let found = check_sample_mapping(&keys, clinical, mapping_cols);
        if !found.is_empty() {
            let originals: BTreeSet<String> = found
                .iter()
                .flat_map(|v| variants[v].iter().cloned())
                .collect();
            missing = missing.difference(&originals).cloned().collect();
            report
                .substituted
                .push((from.to_string(), to.to_string(), originals));
        }
    }

    for col in CLINICAL_SEARCH_COLS {
        let found = check_sample_mapping(&missing, clinical, &[col]);
        if !found.is_empty() {
            missing = missing.difference(&found).cloned().collect();
            report.wrong_column.insert(col.to_string(), found);
        }
    }

    if data_type == "MVX" {
        for col in TRACKING_SEARCH_COLS {
            let found = check_sample_mapping(&missing, tracking, &[col]);
            if !found.is_empty() {
                missing = missing.difference(&found).cloned().collect();
                report.tracking.insert(col.to_string(), found);
            }
        }
    }
    report.missing = missing;
    report
}

fn log_report(report: &QcReport) {
    info!("{}: correctly mapped {} samples", report.data_type, report.mapped.len());
    for (from, to, found) in &report.substituted {
        warn!(
            "Found {} more samples after replacing {} with {} in sample IDs:\n{}",
            found.len(),
            from,
            to,
            found.iter().cloned().collect::<Vec<_>>().join("\n")
        );
    }
    for (col, found) in &report.wrong_column {
        warn!(
            "Found {} samples for data type {} in incorrect column {}:\n{}",
            found.len(),
            report.data_type,
            col,
            found.iter().cloned().collect::<Vec<_>>().join("\n")
        );
    }
    for (col, found) in &report.tracking {
        warn!(
            "Found {} samples for data type {} in tracking sheet column {}:\n{}",
            found.len(),
            report.data_type,
            col,
            found.iter().cloned().collect::<Vec<_>>().join("\n")
        );
    }
    if !report.missing.is_empty() {
        warn!(
            "Final missing samples: {}\n{}",
            report.missing.len(),
            report.missing.iter().cloned().collect::<Vec<_>>().join("\n")
        );
    }
}

/// Checks every QC data type present in the manifest and logs the outcome.
pub fn qc_sample_mapping(
    manifest: &Manifest,
    clinical: &Table,
    tracking: &Table,
    config: &ProjectConfig,
) -> Vec<QcReport> {
    let mut reports = Vec::new();
    for data_type in QC_DATA_TYPES {
        let samples: BTreeSet<String> = manifest
            .input_files(data_type)
            .iter()
            .map(|f| sample_name(f, None))
            .collect();
        if samples.is_empty() {
            continue;
        }
        let mapping_cols = config
            .mapping_columns
            .get(*data_type)
            .cloned()
            .unwrap_or_default();
        let report = check_data_type(data_type, samples, clinical, tracking, &mapping_cols);
        log_report(&report);
        reports.push(report);
    }
    reports
}
