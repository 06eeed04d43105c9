//! Rebuild the KneadData read counts table from legacy KneadData logs, for
//! the visualization reports that expect it.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 knead-log-counts -d MTX -o kneaddata_read_count_table.tsv logs/
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

use crate::common;
use crate::table::Table;

pub const SAMPLE_COL: &str = "Sample";

const LEGACY_TAGS: &[(&str, &str)] = &[
    ("Initial number of reads", "raw"),
    ("Total reads after trimming", "trimmed"),
    (
        "Total reads after removing those found in reference database",
        "decontaminated Homo_sapiens",
    ),
    ("Total reads after merging results from multiple databases", "final"),
];

const MGX_COLUMNS: &[&str] = &[
    "raw pair1",
    "raw pair2",
    "trimmed pair1",
    "trimmed pair2",
    "trimmed orphan1",
    "trimmed orphan2",
    "decontaminated Homo_sapiens pair1",
    "decontaminated Homo_sapiens pair2",
    "decontaminated Homo_sapiens orphan1",
    "decontaminated Homo_sapiens orphan2",
    "final pair1",
    "final pair2",
    "final orphan1",
    "final orphan2",
];

const MTX_COLUMNS: &[&str] = &[
    "raw pair1",
    "raw pair2",
    "trimmed pair1",
    "trimmed pair2",
    "trimmed orphan1",
    "trimmed orphan2",
    "decontaminated Homo_sapiens pair1",
    "decontaminated Homo_sapiens pair2",
    "decontaminated SILVA_128_LSUParc_SSUParc_ribosomal_RNA pair1",
    "decontaminated SILVA_128_LSUParc_SSUParc_ribosomal_RNA pair2",
    "decontaminated human_hg38_refMrna pair1",
    "decontaminated human_hg38_refMrna pair2",
    "decontaminated Homo_sapiens orphan1",
    "decontaminated Homo_sapiens orphan2",
    "decontaminated SILVA_128_LSUParc_SSUParc_ribosomal_RNA orphan1",
    "decontaminated SILVA_128_LSUParc_SSUParc_ribosomal_RNA orphan2",
    "decontaminated human_hg38_refMrna orphan1",
    "decontaminated human_hg38_refMrna orphan2",
    "final pair1",
    "final pair2",
    "final orphan1",
    "final orphan2",
];

lazy_static! {
    static ref COUNT_LINE: Regex =
        Regex::new(r"([A-Z][A-Za-z ]+?)\s*\(\s*([^)]*?)\s*\)\s*:\s*([0-9]+(?:\.[0-9]+)?)\s*$").unwrap();
}

pub fn columns(data_type: &str) -> Result<&'static [&'static str]> {
    match data_type {
        "MGX" => Ok(MGX_COLUMNS),
        "MTX" => Ok(MTX_COLUMNS),
        _ => bail!("unsupported data type {} (expected MGX or MTX)", data_type),
    }
}

/// Column for a count reported for `fname`: orphan reads come from the
/// `single` files, the mate from the pair identifier.
fn column_name(tag: &str, fname: &str, pair_identifier: &str) -> String {
    let fname = fname.to_lowercase();
    let pair_identifier = pair_identifier.to_lowercase();
    let kind = if fname.contains("single") { "orphan" } else { "pair" };
    if fname.contains(&pair_identifier) {
        format!("{} {}1", tag, kind)
    } else if fname.contains(&common::mate_identifier(&pair_identifier)) {
        format!("{} {}2", tag, kind)
    } else {
        tag.to_owned()
    }
}

/// Read counts found in one log, by column.
pub fn parse_log(content: &str, pair_identifier: &str) -> BTreeMap<String, String> {
    let mut counts = BTreeMap::new();
    for line in content.lines() {
        let caps = match COUNT_LINE.captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        let legacy = caps[1].trim();
        let tag = match LEGACY_TAGS.iter().find(|(l, _)| legacy.ends_with(l)) {
            Some((_, tag)) => tag,
            None => continue,
        };
        let count = caps[3].trim_end_matches(".0").to_owned();
        counts.insert(column_name(tag, &caps[2], pair_identifier), count);
    }
    counts
}

/// Collects the counts of all logs in a table with one row per sample.
pub fn read_counts<P: AsRef<Path>>(logs: &[P], data_type: &str, pair_identifier: &str) -> Result<Table> {
    let mut header = vec![SAMPLE_COL.to_owned()];
    header.extend(columns(data_type)?.iter().map(|c| c.to_string()));
    let mut table = Table::new(header);
    for log in logs {
        let content = fs::read_to_string(log)
            .with_context(|| format!("could not read {}", log.as_ref().display()))?;
        let counts = parse_log(&content, pair_identifier);
        if counts.is_empty() {
            warn!("No read counts found in {}", log.as_ref().display());
            continue;
        }
        let sample = common::sample_name(log, None);
        table.push_record(
            std::iter::once((SAMPLE_COL.to_owned(), sample)).chain(counts.into_iter()),
        );
    }
    Ok(table)
}

/// Every `*.log` file in `input_dir`.
pub fn log_files<P: AsRef<Path>>(input_dir: P) -> Result<Vec<PathBuf>> {
    let pattern = input_dir.as_ref().join("*.log");
    let mut logs = glob::glob(&pattern.to_string_lossy())?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    logs.sort();
    Ok(logs)
}

pub fn knead_log_counts<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output: Q,
    data_type: &str,
    pair_identifier: &str,
) -> Result<()> {
    let logs = log_files(&input_dir)?;
    info!("Parsing {} KneadData logs.", logs.len());
    let table = read_counts(&logs, data_type, pair_identifier)?;
    table.to_path_with_delimiter(output, b'\t', "NA")
}
