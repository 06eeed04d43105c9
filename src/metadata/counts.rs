//! Summary counts of the stool and biopsy samples in the merged metadata.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 sample-counts -m hmp2_metadata.csv --clinical hmp2_clinical.csv
//! ```
use std::collections::HashSet;

use log::info;

use super::ids::stool_site_sub_coll;
use super::{BIOPSY_TYPES, DATA_TYPE, SSC_ID};
use crate::config::ProjectConfig;
use crate::table::Table;

const STOOL_CODES: &[&str] = &["MGX", "MBX", "16S", "MVX", "MPX", "MTX"];

#[derive(Debug, Default, PartialEq)]
pub struct StoolCounts {
    pub per_data_type: Vec<(String, usize)>,
    pub total: usize,
    pub unique: usize,
    /// Clinical stool visits with a fecal calprotectin measurement.
    pub fecalcal: usize,
    pub fecalcal_unique: usize,
    pub fecalcal_only: usize,
    pub unique_with_fecalcal: usize,
}

#[derive(Debug, Default, PartialEq)]
pub struct BiopsyCounts {
    pub per_data_type: Vec<(String, usize)>,
    pub total: usize,
    pub unique: usize,
}

pub fn stool_counts(metadata: &Table, clinical: &Table, config: &ProjectConfig) -> StoolCounts {
    let mut counts = StoolCounts::default();
    let mut stool_ids = HashSet::new();
    for code in STOOL_CODES {
        let label = config.data_type_label(code);
        let ids: Vec<&str> = metadata
            .iter()
            .filter(|row| row.get(DATA_TYPE) == label && !row.get("Project").ends_with("BP"))
            .map(|row| row.get(SSC_ID))
            .collect();
        counts.total += ids.len();
        counts.per_data_type.push((label, ids.len()));
        stool_ids.extend(ids);
    }
    counts.unique = stool_ids.len();

    let fecalcal: Vec<String> = clinical
        .iter()
        .filter(|row| row.get("IntervalName").starts_with("Stool") && row.opt("st_q16").is_some())
        .map(|row| {
            let site = config.site_abbreviation(row.get("SiteName")).unwrap_or("");
            stool_site_sub_coll(site, row.get("ProjectSpecificID"), row.get("IntervalName"))
        })
        .collect();
    counts.fecalcal = fecalcal.len();
    let fecalcal: HashSet<&str> = fecalcal.iter().map(|s| s.as_str()).collect();
    counts.fecalcal_unique = fecalcal.len();
    counts.fecalcal_only = fecalcal.difference(&stool_ids).count();
    counts.unique_with_fecalcal = stool_ids.union(&fecalcal).count();
    counts
}

/// Biopsy samples of the biopsy data types, identified by subject and
/// interval sequence; follow-up, baseline and stool visits are excluded.
pub fn biopsy_counts(metadata: &Table) -> BiopsyCounts {
    let mut counts = BiopsyCounts::default();
    let mut biopsy_ids = HashSet::new();
    for data_type in BIOPSY_TYPES {
        let ids: Vec<String> = metadata
            .iter()
            .filter(|row| row.get(DATA_TYPE) == *data_type)
            .filter(|row| {
                let interval = row.get("IntervalName").to_lowercase();
                !(interval.starts_with("stool")
                    || interval.starts_with("follow-up")
                    || interval.starts_with("baseline"))
            })
            .map(|row| format!("{}_{}", row.get("ProjectSpecificID"), row.get("IntervalSequence")))
            .collect();
        counts.total += ids.len();
        counts.per_data_type.push((data_type.to_string(), ids.len()));
        biopsy_ids.extend(ids);
    }
    counts.unique = biopsy_ids.len();
    counts
}

pub fn log_counts(stool: &StoolCounts, biopsy: &BiopsyCounts) {
    for (data_type, n) in &stool.per_data_type {
        info!("Data type: {}, Number of samples: {}", data_type, n);
    }
    info!("Total non-unique stool samples: {}", stool.total);
    info!("Unique stool samples (not including fecalcal): {}", stool.unique);
    info!("Total number of fecalcal samples: {}", stool.fecalcal);
    info!("Unique fecalcal samples: {}", stool.fecalcal_unique);
    info!("Number fecalcal samples with no stool equivalent: {}", stool.fecalcal_only);
    info!("Number of unique stool samples: {}", stool.unique_with_fecalcal);
    for (data_type, n) in &biopsy.per_data_type {
        info!("Data type: {}, Number of samples: {}", data_type, n);
    }
    info!("Total biopsy samples: {}", biopsy.total);
    info!("Unique biopsy samples: {}", biopsy.unique);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let metadata = Table::from_reader(
            "Site/Sub/Coll ID,data_type,Project,ProjectSpecificID,IntervalName,IntervalSequence\n\
             C3010C1,metagenomics,C3010C1_MGX,3010,Stool Collection #1,1\n\
             C3010C1,metabolomics,,3010,Stool Collection #1,1\n\
             C3010C2,metagenomics,,3010,Stool Collection #2,2\n\
             C3010CSC1,amplicon,C3010CSC1_BP,3010,Screening Colonoscopy,3\n\
             C3010CSC1,host_transcriptomics,,3010,Screening Colonoscopy,3\n\
             C3010CSC1,biopsy_16S,,3010,Screening Colonoscopy,3\n\
             C3010CBL1,methylome,,3010,Baseline (IBD and Healthy),4\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        let clinical = Table::from_reader(
            "SiteName,ProjectSpecificID,IntervalName,st_q16\n\
             Cedars-Sinai,3010,Stool Collection #2,120\n\
             Cedars-Sinai,3010,Stool Collection #3,55\n\
             Cedars-Sinai,3010,Stool Collection #4,\n\
             Cedars-Sinai,3010,Screening Colonoscopy,7\n"
                .as_bytes(),
            b',',
        )
        .unwrap();

        let stool = stool_counts(&metadata, &clinical, &ProjectConfig::default());
        assert_eq!(stool.total, 3);
        assert_eq!(stool.unique, 2);
        assert_eq!(stool.fecalcal, 2);
        assert_eq!(stool.fecalcal_only, 1);
        assert_eq!(stool.unique_with_fecalcal, 3);

        let biopsy = biopsy_counts(&metadata);
        assert_eq!(biopsy.total, 2);
        assert_eq!(biopsy.unique, 1);
    }
}
