//! Prune samples that exist in the metadata but in no product (and vice
//! versa) so the metadata table and product tables agree.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 harmonize-metadata hmp2_metadata.csv orphans.txt hmp2_metadata.pruned.csv
//! $ hmp2 harmonize-tsv taxonomic_profiles.tsv orphans.txt taxonomic_profiles.pruned.tsv
//! ```
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use super::{DATA_TYPE, EXTERNAL_ID};
use crate::table::Table;

fn read_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("could not read sample list {}", path.as_ref().display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Reads `External ID<TAB>data_type` lines into data type -> External IDs.
pub fn read_removal_list<P: AsRef<Path>>(path: P) -> Result<HashMap<String, HashSet<String>>> {
    let mut samples: HashMap<String, HashSet<String>> = HashMap::new();
    for line in read_list(path)? {
        let fields = line.split('\t').collect_vec();
        let id = fields[0].to_owned();
        let data_type = fields.last().copied().unwrap_or_default().to_owned();
        samples.entry(data_type).or_default().insert(id);
    }
    Ok(samples)
}

/// Drops metadata rows whose (External ID, data_type) is listed.
pub fn prune_metadata(metadata: &Table, remove: &HashMap<String, HashSet<String>>) -> Table {
    let pruned = metadata.filter(|row| {
        !remove
            .get(row.get(DATA_TYPE))
            .map_or(false, |ids| ids.contains(row.get(EXTERNAL_ID)))
    });
    info!("Removed {} metadata rows.", metadata.len() - pruned.len());
    pruned
}

pub fn harmonize_metadata<P: AsRef<Path>>(metadata: P, samples: P, output: P) -> Result<()> {
    let table = Table::from_path_with_delimiter(metadata, b',')?;
    let pruned = prune_metadata(&table, &read_removal_list(samples)?);
    pruned.to_path_with_delimiter(output, b',', "")
}

/// Copies a tab-delimited product table without the listed sample columns.
/// Cells are passed through untouched.
pub fn harmonize_tsv<P: AsRef<Path>>(tsv: P, samples: P, output: P) -> Result<()> {
    let remove: HashSet<String> = read_list(samples)?
        .into_iter()
        .map(|line| line.split('\t').next().unwrap_or_default().to_owned())
        .collect();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(&tsv)
        .with_context(|| format!("could not open {}", tsv.as_ref().display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(&output)?;

    let mut keep: Option<Vec<usize>> = None;
    for record in reader.records() {
        let record = record?;
        let keep = keep.get_or_insert_with(|| {
            record
                .iter()
                .enumerate()
                .filter(|(i, column)| *i == 0 || !remove.contains(*column))
                .map(|(i, _)| i)
                .collect()
        });
        writer.write_record(keep.iter().map(|&i| record.get(i).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}
