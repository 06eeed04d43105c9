//! Project configuration in YAML.
//!
//! A configuration file may be flat or split into sections: a `base`
//! section shared by all tools and one section per data type (`MGX`,
//! `HTX`, ...). Selecting a section overlays its keys onto `base`.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Manifest data type codes to `data_type` labels.
    pub dtype_mapping: BTreeMap<String, String>,
    /// Per-section alias of `dtype_mapping` used by the analysis tools.
    pub data_type_mapping: BTreeMap<String, String>,
    /// Site names to single-letter abbreviations.
    pub site_map: BTreeMap<String, String>,
    pub drop_cols: Vec<String>,
    pub col_order: Vec<String>,
    pub baseline_cols: Vec<String>,
    pub research_project: String,
    /// Fragments removed from analysis column headers before matching ids.
    pub analysis_col_patterns: Vec<String>,
    #[serde(deserialize_with = "flatten_columns")]
    pub target_metadata_cols: Vec<String>,
    /// Clinical columns searched when checking sample mappings, per data type.
    #[serde(deserialize_with = "flatten_column_map")]
    pub mapping_columns: BTreeMap<String, Vec<String>>,
    pub col_rename: HashMap<String, String>,
    pub value_recode: BTreeMap<String, HashMap<String, String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        };
        let dtype_mapping = pairs(&[
            ("MGX", "metagenomics"),
            ("MTX", "metatranscriptomics"),
            ("MVX", "viromics"),
            ("MPX", "proteomics"),
            ("MBX", "metabolomics"),
            ("16S", "amplicon"),
            ("16SBP", "biopsy_16S"),
            ("HTX", "host_transcriptomics"),
            ("HG", "host_genome"),
            ("RRBS", "methylome"),
            ("SER", "serology"),
        ]);
        ProjectConfig {
            data_type_mapping: dtype_mapping.clone(),
            dtype_mapping,
            site_map: pairs(&[
                ("Cincinnati", "H"),
                ("Massachusetts General Hospital", "M"),
                ("Emory", "E"),
                ("MGH Pediatrics", "P"),
                ("Cedars-Sinai", "C"),
            ]),
            drop_cols: Vec::new(),
            col_order: Vec::new(),
            baseline_cols: Vec::new(),
            research_project: "ibdmdb".to_owned(),
            analysis_col_patterns: Vec::new(),
            target_metadata_cols: Vec::new(),
            mapping_columns: BTreeMap::new(),
            col_rename: HashMap::new(),
            value_recode: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    pub fn from_path<P: AsRef<Path>>(path: P, section: Option<&str>) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("could not read config {}", path.as_ref().display()))?;
        Self::from_yaml(&content, section)
            .with_context(|| format!("invalid config {}", path.as_ref().display()))
    }

    pub fn from_yaml(content: &str, section: Option<&str>) -> Result<Self> {
        let root: Value = serde_yaml::from_str(content)?;
        let root = match root {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => anyhow::bail!("configuration must be a YAML mapping"),
        };

        let mut merged = Mapping::new();
        for (k, v) in &root {
            if !v.is_mapping() || !is_section_name(k) {
                merged.insert(k.clone(), v.clone());
            }
        }
        let mut overlay = |name: &str| {
            if let Some(Value::Mapping(m)) = root.get(name) {
                for (k, v) in m {
                    merged.insert(k.clone(), v.clone());
                }
            }
        };
        overlay("base");
        if let Some(section) = section {
            overlay(section);
        }
        Ok(serde_yaml::from_value(Value::Mapping(merged))?)
    }

    /// `data_type` label for a manifest code, falling back to the code itself.
    pub fn data_type_label(&self, code: &str) -> String {
        self.dtype_mapping
            .get(code)
            .or_else(|| self.data_type_mapping.get(code))
            .cloned()
            .unwrap_or_else(|| code.to_owned())
    }

    pub fn site_abbreviation(&self, site_name: &str) -> Option<&str> {
        self.site_map.get(site_name).map(|s| s.as_str())
    }

    pub fn site_name(&self, abbreviation: &str) -> Option<&str> {
        self.site_map
            .iter()
            .find(|(_, abbrev)| abbrev.as_str() == abbreviation)
            .map(|(name, _)| name.as_str())
    }
}

/// Section keys are upper-case data type codes or `base`; every other mapping
/// valued key is a setting.
fn is_section_name(key: &Value) -> bool {
    match key.as_str() {
        Some("base") => true,
        Some(k) => k
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
        None => false,
    }
}

fn flatten(value: Value, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => items.into_iter().for_each(|v| flatten(v, out)),
        Value::String(s) => out.push(s),
        Value::Number(n) => out.push(n.to_string()),
        _ => {}
    }
}

fn flatten_columns<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut columns = Vec::new();
    flatten(Value::deserialize(deserializer)?, &mut columns);
    Ok(columns)
}

fn flatten_column_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let mut columns = Vec::new();
            flatten(value, &mut columns);
            (key, columns)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
research_project: ibdmdb
col_order: [External ID, Participant ID]
base:
  analysis_col_patterns: ["_taxonomic_profile", "_Abundance"]
mapping_columns:
  HTX: [[bx_q5, bx_q6], bx_q9]
MGX:
  analysis_col_patterns: ["_genefamilies"]
  target_metadata_cols:
    - [week_num, diagnosis]
    - [site_name]
"#;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::from_yaml("", None).unwrap();
        assert_eq!(config.data_type_label("MGX"), "metagenomics");
        assert_eq!(config.site_abbreviation("Emory"), Some("E"));
        assert_eq!(config.site_name("C"), Some("Cedars-Sinai"));
        assert_eq!(config.research_project, "ibdmdb");
    }

    #[test]
    fn test_sections_overlay_base() {
        let config = ProjectConfig::from_yaml(CONFIG, None).unwrap();
        assert_eq!(config.analysis_col_patterns.len(), 2);
        assert_eq!(config.col_order, vec!["External ID", "Participant ID"]);
        assert_eq!(config.mapping_columns["HTX"], vec!["bx_q5", "bx_q6", "bx_q9"]);

        let config = ProjectConfig::from_yaml(CONFIG, Some("MGX")).unwrap();
        assert_eq!(config.analysis_col_patterns, vec!["_genefamilies"]);
        assert_eq!(
            config.target_metadata_cols,
            vec!["week_num", "diagnosis", "site_name"]
        );
    }
}
