//! Convert Excel workbooks (tracking sheets, data dictionaries) to CSV.
//!
//! Only the first worksheet is converted.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 excel-to-csv -o out hmp2_data_dictionary.xlsx
//! ```
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Reader};

use crate::common;

/// The cells of the first worksheet as strings, row by row.
pub fn read_first_sheet<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("could not open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?
        .with_context(|| format!("could not read first worksheet of {}", path.display()))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}

pub fn excel_to_csv<P: AsRef<Path>, Q: AsRef<Path>>(files: &[P], output_dir: Q) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    for file in files {
        let rows = read_first_sheet(file)?;
        let output = common::name_file(
            &output_dir,
            &common::sample_name(file, None),
            None,
            Some("csv"),
        );
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&output)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_first_sheet() {
        let rows = read_first_sheet("tests/data_dictionary.xlsx").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec!["Variable Name", "Field Label", "Value"]);
        assert_eq!(rows[1], vec!["bl_q4", "Blood sample ID", "42"]);
        assert_eq!(rows[3], vec!["consent_age", "", "Age, years"]);
        assert!(rows.iter().flatten().all(|cell| cell != "not converted"));
    }

    #[test]
    fn test_missing_workbook() {
        assert!(read_first_sheet("tests/missing.xlsx").is_err());
    }
}
