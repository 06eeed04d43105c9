//! Relative abundances from a counts table: every sample column is divided
//! by its total.
//!
//! ## Usage:
//!
//! Writes `out/taxonomic_profiles.rel_abund.tsv`:
//! ```bash
//! $ hmp2 relative-abundance -o out taxonomic_profiles.tsv
//! ```
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::common;

/// Normalizes the counts of each column (all but the first) to sum to one.
/// Columns summing to zero have no defined abundance and are written as `NA`.
pub fn normalize(rows: &[Vec<String>]) -> Result<Vec<Vec<String>>> {
    let n_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut counts = Vec::with_capacity(rows.len());
    let mut totals = vec![0.0; n_cols];
    for row in rows {
        let values = row
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, cell)| -> Result<f64> {
                let value = if cell.trim().is_empty() {
                    0.0
                } else {
                    cell.trim()
                        .parse::<f64>()
                        .with_context(|| format!("non-numeric count '{}' for {}", cell, row[0]))?
                };
                totals[i] += value;
                Ok(value)
            })
            .collect::<Result<Vec<f64>>>()?;
        counts.push(values);
    }

    Ok(rows
        .iter()
        .zip(counts)
        .map(|(row, values)| {
            let mut out = vec![row[0].clone()];
            out.extend(values.iter().enumerate().map(|(i, value)| {
                let total = totals[i + 1];
                if total == 0.0 {
                    "NA".to_owned()
                } else {
                    (value / total).to_string()
                }
            }));
            out
        })
        .collect())
}

pub fn relative_abundance<P: AsRef<Path>, Q: AsRef<Path>>(counts_table: P, output_dir: Q) -> Result<PathBuf> {
    let output = common::name_file(
        &output_dir,
        &common::sample_name(&counts_table, None),
        None,
        Some("rel_abund.tsv"),
    );
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(&counts_table)
        .with_context(|| format!("could not open {}", counts_table.as_ref().display()))?;
    let mut records = reader.records();
    let header = match records.next() {
        Some(header) => header?,
        None => bail!("{} is empty", counts_table.as_ref().display()),
    };
    let rows = records
        .map(|r| -> Result<Vec<String>> { Ok(r?.iter().map(|c| c.to_owned()).collect()) })
        .collect::<Result<Vec<Vec<String>>>>()?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(&output)?;
    writer.write_record(&header)?;
    for row in normalize(&rows)? {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        let rows = vec![row(&["g1", "1", "0"]), row(&["g2", "3", "0"])];
        assert_eq!(
            normalize(&rows).unwrap(),
            vec![row(&["g1", "0.25", "NA"]), row(&["g2", "0.75", "NA"])]
        );
        assert!(normalize(&[row(&["g1", "x"])]).is_err());
    }

    #[test]
    fn test_relative_abundance() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ecs.tsv");
        fs::write(&input, "# Gene Family\tS1\tS2\nEC1\t2\t1\nEC2\t2\t3\n").unwrap();
        let output = relative_abundance(&input, dir.path()).unwrap();
        assert_eq!(output, dir.path().join("ecs.rel_abund.tsv"));
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "# Gene Family\tS1\tS2\nEC1\t0.5\t0.25\nEC2\t0.5\t0.75\n"
        );
    }
}
