//! Assembly and maintenance of the merged HMP2 metadata table and the tools
//! that decorate, rename and check analysis products with it.
pub mod collection;
pub mod counts;
pub mod harmonize;
pub mod ids;
pub mod merge;
pub mod pcl;
pub mod qc;
pub mod readable;
pub mod rename;
pub mod viromics;

use std::path::Path;

use anyhow::Result;
use log::warn;

use crate::table::Table;

pub const SSC: &str = "Site/Sub/Coll";
pub const SSC_ID: &str = "Site/Sub/Coll ID";
pub const EXTERNAL_ID: &str = "External ID";
pub const DATA_TYPE: &str = "data_type";
pub const PARTICIPANT_ID: &str = "Participant ID";
pub const VISIT_NUM: &str = "visit_num";
pub const WEEK_NUM: &str = "week_num";
pub const RECEIPT_DATE: &str = "Actual Date of Receipt";
pub const NO_PRODUCT: &str = "noproduct";

/// Data types derived from biopsies; they have no stool collection number.
pub const BIOPSY_TYPES: &[&str] = &["host_transcriptomics", "biopsy_16S", "methylome"];

pub fn is_biopsy_type(data_type: &str) -> bool {
    BIOPSY_TYPES.contains(&data_type)
}

/// Merges a supplementary table into `metadata`. The supplement is keyed on
/// its first column, plus `data_type` when it has one; its other columns
/// are added or update existing ones.
pub fn apply_supplement(metadata: &mut Table, supplement: &Table, source: &Path) {
    let first = match supplement.columns().first() {
        Some(col) => col.clone(),
        None => return,
    };
    let mut keys = vec![first.as_str()];
    if supplement.has_column(DATA_TYPE) && first != DATA_TYPE {
        keys.push(DATA_TYPE);
    }
    if let Some(missing) = keys.iter().find(|k| !metadata.has_column(k)) {
        warn!(
            "Skipping supplementary metadata {}: metadata has no column '{}'.",
            source.display(),
            missing
        );
        return;
    }
    metadata.update(supplement, &keys);
}

/// Reads a supplementary metadata file (tab-delimited unless `.csv`).
pub fn read_supplement<P: AsRef<Path>>(path: P) -> Result<Table> {
    let delimiter = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some("csv") => b',',
        _ => b'\t',
    };
    Table::from_path_with_delimiter(path, delimiter)
}
