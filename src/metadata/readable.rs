//! Replace coded StudyTrax column names and values with the human readable
//! ones from the study data dictionary.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 human-readable-metadata -c hmp2_project.yaml hmp2_metadata.csv \
//!     data_dictionary.xlsx hmp2_metadata.readable.csv
//! ```
use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use crate::config::ProjectConfig;
use crate::convert::excel::read_first_sheet;
use crate::table::Table;

const CODE_COL: &str = "Code";
const NAME_COL: &str = "Variable Name";
const PICK_LIST_COL: &str = "Pick Lists  (Value, Missing, Name)";

/// Flag columns coded as 0/1.
const YES_NO_COLS: &[&str] = &[
    "bx_q31", "bx_q33", "bx_q35", "i_q3", "i_q4", "i_q5", "i_q6", "i_q7", "i_q8", "i_q9",
    "i_q10", "i_q11", "i_q12", "i_q13", "i_q14", "i_q15", "ic_q1", "ic_q5", "ic_q6", "i_q16",
    "i_q17", "i_q18", "i_q19", "i_q20", "i_q21", "i_q22", "i_q23", "i_q24", "i_q25", "i_q26",
    "i_q27", "i_q28", "i_q29", "i_q30", "i_q31", "i_q32", "i_q33", "i_q34", "i_q35", "i_q36",
    "i_q37", "i_q38", "i_q39", "i_q40", "i_q41", "i_q42", "i_q43", "i_q44", "i_q45", "i_q46",
    "i_q47", "i_q48", "i_q49", "i_q50", "bl_q12", "bl_q14", "bl_q16", "st_q1", "st_q9",
    "st_q19", "st_q21", "st_q23", "hbi_q2", "hbi_q9", "hbi_q10", "hbi_q11", "hbi_q12",
    "hbi_q13", "hbi_q14", "hbi_q15", "hbi_q16", "sccai_q2", "sccai_q11", "sccai_q12",
    "sccai_q13", "sccai_q14", "ses_score2", "mbs_q15", "dr_q2", "dr_q2a", "dr_q2b", "dr_q2c",
    "dr_q3", "dr_q4", "dr_q5", "dr_q6", "dr_q7",
];

/// Biopsy location columns that only make sense next to their coded
/// counterparts.
const CONFUSING_COLS: &[&str] = &[
    "bx_q8", "bx_q10", "bx_q16", "bx_q18", "bx_q24", "bx_q26", "Site/Sub/Coll",
];

/// Disease location columns reduced to their leading code (`L3 (ileocolonic)` -> `L3`).
const LOCATION_COLS: &[&str] = &["mc_q4", "mc_q7"];

#[derive(Debug, Default)]
pub struct DataDictionary {
    column_names: HashMap<String, String>,
    values: HashMap<String, HashMap<String, String>>,
}

impl DataDictionary {
    /// Reads the dictionary from an Excel workbook (first sheet) or a CSV file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_excel = matches!(
            path.as_ref().extension().and_then(|e| e.to_str()),
            Some("xlsx") | Some("xls") | Some("xlsm")
        );
        let table = if is_excel {
            let mut rows = read_first_sheet(&path)?.into_iter();
            let header = rows.next().unwrap_or_default();
            Table::from_rows(header, rows.collect())
        } else {
            Table::from_path_with_delimiter(&path, b',')?
        };
        Ok(Self::from_table(&table))
    }

    pub fn from_table(table: &Table) -> Self {
        let mut dictionary = DataDictionary::default();
        for row in table.iter() {
            let code = row.get(CODE_COL);
            if code.is_empty() {
                continue;
            }
            if let Some(name) = row.opt(NAME_COL) {
                dictionary.column_names.insert(code.to_owned(), name.to_owned());
            }
            if let Some(pick_list) = row.opt(PICK_LIST_COL) {
                dictionary.add_pick_list(code, pick_list);
            }
        }
        if let Some(diagnosis) = dictionary.values.get_mut("diagnosis") {
            *diagnosis = diagnosis
                .drain()
                .map(|(k, v)| (k.replace(".0", ""), v))
                .collect();
        }
        dictionary
    }

    /// Pick lists are `value,missing,name` lines. Values are also registered
    /// in their float spelling (`1.0`) since numeric exports use it.
    fn add_pick_list(&mut self, code: &str, pick_list: &str) {
        let mut targets = vec![code.to_owned()];
        if code == "Sex" || code == "Race" {
            targets.push(code.to_lowercase());
        }
        for line in pick_list.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.splitn(3, ',').collect();
            if fields.len() < 3 {
                warn!("Malformed pick list entry '{}' for {}.", line, code);
                continue;
            }
            let value = fields[0].trim();
            let human = fields[2].replace(':', "").trim().to_owned();
            for target in &targets {
                let lookup = self.values.entry(target.clone()).or_default();
                lookup.insert(value.to_owned(), human.clone());
                if let Ok(v) = value.parse::<f64>() {
                    lookup.insert(format!("{:?}", v), human.clone());
                }
            }
        }
    }
}

fn recode(table: &mut Table, column: &str, lookup: &HashMap<String, String>) {
    if !table.has_column(column) {
        return;
    }
    table.map_column(column, |row| {
        let value = row.get(column);
        lookup.get(value).cloned().unwrap_or_else(|| value.to_owned())
    });
}

/// Rewrites coded values and column names in place.
pub fn make_human_readable(metadata: &mut Table, dictionary: &DataDictionary, config: &ProjectConfig) {
    for (column, lookup) in &dictionary.values {
        recode(metadata, column, lookup);
    }

    let yes_no: HashMap<String, String> = [("0", "No"), ("1", "Yes"), ("0.0", "No"), ("1.0", "Yes")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for column in YES_NO_COLS {
        recode(metadata, column, &yes_no);
    }
    for (column, lookup) in &config.value_recode {
        recode(metadata, column, lookup);
    }

    metadata.drop_columns(CONFUSING_COLS);

    for column in LOCATION_COLS {
        if metadata.has_column(column) {
            metadata.map_column(column, |row| {
                let value = row.get(column).replace(' ', "");
                value.split('(').next().unwrap_or_default().to_owned()
            });
        }
    }

    let mut names: HashMap<String, String> = dictionary
        .column_names
        .iter()
        .filter(|(_, name)| !name.is_empty())
        .map(|(code, name)| (code.clone(), name.clone()))
        .collect();
    names.extend(config.col_rename.iter().map(|(k, v)| (k.clone(), v.clone())));
    metadata.rename_columns(&names);
    info!("Recoded {} metadata rows.", metadata.len());
}

pub fn human_readable_metadata<P: AsRef<Path>>(
    metadata: P,
    config: &ProjectConfig,
    dictionary: P,
    output: P,
) -> Result<()> {
    let mut table = Table::from_path_with_delimiter(metadata, b',')?;
    let dictionary = DataDictionary::from_path(dictionary)?;
    make_human_readable(&mut table, &dictionary, config);
    table.to_path_with_delimiter(output, b',', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> DataDictionary {
        let mut table = Table::new(vec![
            CODE_COL.to_owned(),
            NAME_COL.to_owned(),
            PICK_LIST_COL.to_owned(),
        ]);
        table.push_row(vec![
            "Sex".to_owned(),
            "Gender".to_owned(),
            "1,0,Male:\r\n2,0,Female".to_owned(),
        ]);
        table.push_row(vec![
            "diagnosis".to_owned(),
            "Diagnosis".to_owned(),
            "1,0,CD\r\n2,0,UC\r\n3,0,nonIBD".to_owned(),
        ]);
        table.push_row(vec!["hbi".to_owned(), "HBI score".to_owned(), String::new()]);
        DataDictionary::from_table(&table)
    }

    #[test]
    fn test_pick_lists() {
        let dictionary = dictionary();
        assert_eq!(dictionary.values["Sex"]["1"], "Male");
        assert_eq!(dictionary.values["sex"]["2.0"], "Female");
        assert_eq!(dictionary.values["diagnosis"]["1"], "CD");
        assert!(!dictionary.values.contains_key("hbi"));
    }

    #[test]
    fn test_make_human_readable() {
        let mut metadata = Table::from_reader(
            "sex,diagnosis,hbi,dr_q2,mc_q4,bx_q8,st_q4\n\
             1.0,3,4,1,L3 (ileocolonic),2,SM-1\n\
             2,1,,0.0,,,SM-2\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        let mut config = ProjectConfig::default();
        config.col_rename.insert("st_q4".to_owned(), "stool_id".to_owned());
        make_human_readable(&mut metadata, &dictionary(), &config);

        assert_eq!(
            metadata.columns(),
            &["sex", "Diagnosis", "HBI score", "dr_q2", "mc_q4", "stool_id"]
        );
        assert_eq!(metadata.row(0).values(), &["Male", "nonIBD", "4", "Yes", "L3", "SM-1"]);
        assert_eq!(metadata.row(1).values(), &["Female", "CD", "", "No", "", "SM-2"]);
    }
}
