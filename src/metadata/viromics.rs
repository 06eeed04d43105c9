//! Repair viromics sample ids that were entered into the wrong StudyTrax
//! stool columns (`st_q12` viromics, `st_q13` storage, `st_q10` DNA/RNA).
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 fix-viromic-ids viromics_samples.txt hmp2_clinical.csv \
//!     broad_tracking.csv hmp2_clinical.fixed.csv
//! ```
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use super::ids::normalize_number;
use crate::errors::Error;
use crate::table::Table;

const VIROMICS_COL: &str = "st_q12";
const STORAGE_COL: &str = "st_q13";
const DNA_RNA_COL: &str = "st_q10";
const STOOL_COL: &str = "st_q4";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViromicsFix {
    /// The id already sits in the viromics column.
    Mapped,
    /// Viromics and storage ids were swapped.
    SwappedStorage,
    /// The storage column held the DNA/RNA id and the DNA/RNA column the
    /// storage id.
    SwappedDnaRna,
    /// No consistent swap was found; the row is left alone.
    Unchanged,
    /// The empty viromics column was filled from the tracking sheet.
    Filled,
}

fn find(table: &Table, column: &str, value: &str) -> Option<usize> {
    table.iter().find(|row| row.get(column) == value).map(|row| row.index())
}

/// Fixes the clinical row that should carry `sample_id` as its viromics id.
pub fn fix_viromics_id(
    clinical: &mut Table,
    tracking: &Table,
    sample_id: &str,
) -> std::result::Result<ViromicsFix, Error> {
    let unidentified = || Error::ViromicsId {
        sample_id: sample_id.to_owned(),
    };
    if find(clinical, VIROMICS_COL, sample_id).is_some() {
        return Ok(ViromicsFix::Mapped);
    }

    if let Some(idx) = find(clinical, STORAGE_COL, sample_id) {
        let storage_id = clinical.get(idx, VIROMICS_COL).to_owned();
        let parent = clinical.get(idx, STOOL_COL).to_owned();
        let tracked = find(tracking, "Parent Sample A", &parent).ok_or_else(unidentified)?;
        let tracked_storage = tracking.get(tracked, "Storage");

        if tracked_storage == storage_id {
            clinical.set(idx, STORAGE_COL, storage_id);
            clinical.set(idx, VIROMICS_COL, sample_id);
            return Ok(ViromicsFix::SwappedStorage);
        } else if tracking.get(tracked, "DNA/RNA") == storage_id {
            let dna_rna_id = storage_id;
            let storage_id = clinical.get(idx, DNA_RNA_COL).to_owned();
            if tracked_storage == storage_id {
                clinical.set(idx, DNA_RNA_COL, dna_rna_id);
                clinical.set(idx, VIROMICS_COL, sample_id);
                clinical.set(idx, STORAGE_COL, storage_id);
                return Ok(ViromicsFix::SwappedDnaRna);
            }
            return Ok(ViromicsFix::Unchanged);
        }
        return Err(unidentified());
    }

    let tracked = find(tracking, "Viromics", sample_id).ok_or_else(unidentified)?;
    let parent = tracking.get(tracked, "Parent Sample A");
    let subject = normalize_number(tracking.get(tracked, "Subject"));
    let idx = find(clinical, STOOL_COL, parent).ok_or_else(unidentified)?;
    if !clinical.get(idx, VIROMICS_COL).is_empty() {
        return Err(unidentified());
    }
    if normalize_number(clinical.get(idx, "ProjectSpecificID")) == subject {
        clinical.set(idx, VIROMICS_COL, sample_id);
        Ok(ViromicsFix::Filled)
    } else {
        Ok(ViromicsFix::Unchanged)
    }
}

pub fn fix_viromic_ids<P: AsRef<Path>>(samples: P, clinical: P, tracking: P, output: P) -> Result<()> {
    let sample_ids = fs::read_to_string(&samples)
        .with_context(|| format!("could not read {}", samples.as_ref().display()))?;
    let mut clinical = Table::from_path_with_delimiter(clinical, b',')?;
    let tracking = Table::from_path_with_delimiter(tracking, b',')?;

    let mut fixed = 0;
    for sample_id in sample_ids.lines().map(str::trim).filter(|s| !s.is_empty()) {
        let fix = fix_viromics_id(&mut clinical, &tracking, sample_id)?;
        debug!("{}: {:?}", sample_id, fix);
        if fix != ViromicsFix::Mapped && fix != ViromicsFix::Unchanged {
            fixed += 1;
        }
    }
    info!("Fixed {} viromics ids.", fixed);
    clinical.to_path_with_delimiter(output, b',', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (Table, Table) {
        let clinical = Table::from_reader(
            "ProjectSpecificID,st_q4,st_q10,st_q12,st_q13\n\
             3010,SM-P1,D1,V1,S1\n\
             3010,SM-P2,D2,S2,V2\n\
             3011,SM-P3,S3,D3,V3\n\
             3012,SM-P4,D4,,S4\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        let tracking = Table::from_reader(
            "Subject,Parent Sample A,Storage,DNA/RNA,Viromics\n\
             3010,SM-P2,S2,D2,V2\n\
             3011,SM-P3,S3,D3,V3\n\
             3012.0,SM-P4,S4,D4,V4\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        (clinical, tracking)
    }

    #[test]
    fn test_fix_viromics_id() {
        let (mut clinical, tracking) = tables();
        assert_eq!(fix_viromics_id(&mut clinical, &tracking, "V1").unwrap(), ViromicsFix::Mapped);

        assert_eq!(
            fix_viromics_id(&mut clinical, &tracking, "V2").unwrap(),
            ViromicsFix::SwappedStorage
        );
        assert_eq!(clinical.row(1).values(), &["3010", "SM-P2", "D2", "V2", "S2"]);

        assert_eq!(
            fix_viromics_id(&mut clinical, &tracking, "V3").unwrap(),
            ViromicsFix::SwappedDnaRna
        );
        assert_eq!(clinical.row(2).values(), &["3011", "SM-P3", "D3", "V3", "S3"]);

        assert_eq!(fix_viromics_id(&mut clinical, &tracking, "V4").unwrap(), ViromicsFix::Filled);
        assert_eq!(clinical.get(3, "st_q12"), "V4");

        assert!(fix_viromics_id(&mut clinical, &tracking, "V9").is_err());
    }
}
