//! Label the taxonomy levels of CMMR OTU tables (`k__`, `p__`, ...) so the
//! table can be read by the bioBakery visualizations.
//!
//! ## Usage:
//!
//! Writes `out/otu_table_taxonomy_fix.tsv`:
//! ```bash
//! $ hmp2 fix-otu-taxonomy -o out otu_table.tsv
//! ```
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::common;

const LEVEL_LABELS: &[&str] = &["k", "p", "c", "o", "f", "g", "s"];

/// Labels one taxonomy level. Empty levels such as `g__` come out of CMMR
/// reversed (`__g`) and are turned around.
fn label_level(idx: usize, level: &str) -> String {
    if level.len() == 3 && level.starts_with("__") {
        return level.chars().rev().collect();
    }
    let label = LEVEL_LABELS.get(idx).copied().unwrap_or("t");
    if level.starts_with("__") {
        format!("{}{}", label, level)
    } else if level.contains("__") {
        level.to_owned()
    } else {
        format!("{}__{}", label, level)
    }
}

pub fn label_taxonomy(taxonomy: &str) -> String {
    taxonomy
        .split("; ")
        .enumerate()
        .map(|(idx, level)| label_level(idx, level))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn fix_otu_taxonomy_labels<P: AsRef<Path>, Q: AsRef<Path>>(otu_table: P, output_dir: Q) -> Result<PathBuf> {
    let output = common::name_file(
        &output_dir,
        &common::sample_name(&otu_table, None),
        Some("taxonomy_fix"),
        Some("tsv"),
    );
    let reader = BufReader::new(
        fs::File::open(&otu_table)
            .with_context(|| format!("could not open {}", otu_table.as_ref().display()))?,
    );
    let mut writer = BufWriter::new(fs::File::create(&output)?);
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            writeln!(writer, "{}", line)?;
            continue;
        }
        let line = line.trim();
        match line.rsplit_once('\t') {
            Some((counts, taxonomy)) => writeln!(writer, "{}\t{}", counts, label_taxonomy(taxonomy))?,
            None => writeln!(writer, "{}", label_taxonomy(line))?,
        }
    }
    writer.flush()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_taxonomy() {
        assert_eq!(
            label_taxonomy("Bacteria; __Firmicutes; Clostridia; __o; f__Ruminococcaceae; __g"),
            "k__Bacteria; p__Firmicutes; c__Clostridia; o__; f__Ruminococcaceae; g__"
        );
    }

    #[test]
    fn test_fix_otu_taxonomy_labels() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("otu_table.tsv");
        fs::write(&input, "#OTU ID\tS1\ttaxonomy\nOTU1\t3\tBacteria; Firmicutes\n").unwrap();
        let output = fix_otu_taxonomy_labels(&input, dir.path()).unwrap();
        assert_eq!(output, dir.path().join("otu_table_taxonomy_fix.tsv"));
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "#OTU ID\tS1\ttaxonomy\nOTU1\t3\tk__Bacteria; p__Firmicutes\n"
        );
    }
}
