//! Convert tab-delimited OTU tables to BIOM 1.0 (sparse JSON).
//!
//! The first column holds the observation ids. A trailing `taxonomy` column
//! is parsed into a list of levels and stored as observation metadata.
//! Comment lines are skipped, except a `#OTU ID` style header.
//!
//! ## Usage:
//!
//! Writes `tables/biom/otu_table.biom`:
//! ```bash
//! $ hmp2 tsv-to-biom tables/otu_table.tsv
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::common;

pub const FORMAT: &str = "Biological Observation Matrix 1.0.0";
pub const FORMAT_URL: &str = "http://biom-format.org";

#[derive(Serialize, Debug, PartialEq)]
pub struct ObservationMetadata {
    pub taxonomy: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Observation {
    pub id: String,
    pub metadata: Option<ObservationMetadata>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Column {
    pub id: String,
    pub metadata: Option<()>,
}

#[derive(Serialize, Debug)]
pub struct BiomTable {
    pub id: Option<String>,
    pub format: &'static str,
    pub format_url: &'static str,
    #[serde(rename = "type")]
    pub table_type: &'static str,
    pub generated_by: String,
    pub date: String,
    pub rows: Vec<Observation>,
    pub columns: Vec<Column>,
    pub matrix_type: &'static str,
    pub matrix_element_type: &'static str,
    pub shape: [usize; 2],
    /// Non-zero cells as `[row, column, value]`.
    pub data: Vec<(usize, usize, f64)>,
}

fn is_taxonomy(column: &str) -> bool {
    column.eq_ignore_ascii_case("taxonomy")
}

/// Parses an OTU table in TSV form.
pub fn parse_tsv(content: &str) -> Result<BiomTable> {
    let mut header: Option<Vec<&str>> = None;
    let mut lines = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        if line.starts_with('#') {
            if line.contains('\t') && lines.is_empty() {
                header = Some(line.trim_start_matches('#').split('\t').collect());
            }
            continue;
        }
        if header.is_none() {
            header = Some(line.split('\t').collect());
            continue;
        }
        lines.push(line);
    }
    let header = match header {
        Some(header) if header.len() > 1 => header,
        _ => bail!("OTU table has no header with sample columns"),
    };
    let has_taxonomy = header.last().map_or(false, |c| is_taxonomy(c));
    let n_samples = header.len() - 1 - has_taxonomy as usize;

    let columns = header[1..=n_samples]
        .iter()
        .map(|id| Column {
            id: id.to_string(),
            metadata: None,
        })
        .collect();
    let mut rows = Vec::new();
    let mut data = Vec::new();
    for (r, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        for c in 0..n_samples {
            let cell = fields.get(c + 1).map_or("", |f| f.trim());
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell
                .parse()
                .with_context(|| format!("non-numeric count '{}' for {}", cell, fields[0]))?;
            if value != 0.0 {
                data.push((r, c, value));
            }
        }
        let metadata = if has_taxonomy {
            let taxonomy = fields.get(n_samples + 1).copied().unwrap_or_default();
            Some(ObservationMetadata {
                taxonomy: taxonomy.split(';').map(|l| l.trim().to_owned()).collect(),
            })
        } else {
            None
        };
        rows.push(Observation {
            id: fields[0].to_owned(),
            metadata,
        });
    }

    Ok(BiomTable {
        id: None,
        format: FORMAT,
        format_url: FORMAT_URL,
        table_type: "OTU table",
        generated_by: format!("hmp2 {}", env!("CARGO_PKG_VERSION")),
        date: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        shape: [rows.len(), n_samples],
        rows,
        columns,
        matrix_type: "sparse",
        matrix_element_type: "float",
        data,
    })
}

/// Converts each table to `<table dir>/biom/<stem>.biom`.
pub fn tsv_to_biom<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    for file in files {
        let file = file.as_ref();
        let content = fs::read_to_string(file)
            .with_context(|| format!("could not read {}", file.display()))?;
        let table = parse_tsv(&content).with_context(|| format!("invalid OTU table {}", file.display()))?;
        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        let output = common::name_file_in_subfolder(
            dir,
            "biom",
            &common::sample_name(file, None),
            None,
            Some("biom"),
        )?;
        fs::write(&output, serde_json::to_string(&table)?)?;
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTU_TABLE: &str = "# Constructed from biom file\n\
        #OTU ID\tS1\tS2\ttaxonomy\n\
        OTU1\t10\t0\tk__Bacteria; p__Firmicutes\n\
        OTU2\t0\t3.5\tk__Bacteria; p__Bacteroidetes\n";

    #[test]
    fn test_parse_tsv() {
        let table = parse_tsv(OTU_TABLE).unwrap();
        assert_eq!(table.shape, [2, 2]);
        assert_eq!(table.data, vec![(0, 0, 10.0), (1, 1, 3.5)]);
        assert_eq!(table.columns[1].id, "S2");
        assert_eq!(
            table.rows[1].metadata.as_ref().unwrap().taxonomy,
            vec!["k__Bacteria", "p__Bacteroidetes"]
        );

        let json: serde_json::Value = serde_json::to_value(&table).unwrap();
        assert_eq!(json["type"], "OTU table");
        assert_eq!(json["data"][1], serde_json::json!([1, 1, 3.5]));
        assert_eq!(json["columns"][0]["metadata"], serde_json::Value::Null);
    }

    #[test]
    fn test_tsv_to_biom() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("otu_table.tsv");
        fs::write(&input, "OTU ID\tS1\nOTU1\t4\n").unwrap();
        let outputs = tsv_to_biom(&[&input]).unwrap();
        assert_eq!(outputs, vec![dir.path().join("biom/otu_table.biom")]);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&outputs[0]).unwrap()).unwrap();
        assert_eq!(json["shape"], serde_json::json!([1, 1]));
        assert_eq!(json["rows"][0]["metadata"], serde_json::Value::Null);
    }
}
