//! Submission manifests.
//!
//! A manifest describes one batch of submitted data files, grouped by data
//! type code:
//!
//! ```yaml
//! origin_institute: Broad Institute
//! origin_contact: Jane Doe
//! origin_contact_email: jdoe@example.org
//! project: HMP2
//! submission_date: 2017-04-17
//! submitted_files:
//!   16S:
//!     input:
//!       - /seq/picard_aggregation/G79182/MSM5LLFU/current/MSM5LLFU.bam
//! ```
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 manifest-from-file-list -i files.txt -d MGX -p HMP2 \
//!     --origin-institute Broad --origin-contact "Jane Doe" \
//!     --origin-contact-email jdoe@example.org -o MANIFEST.yaml
//! ```
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use derive_new::new;
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::table::Table;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DataFiles {
    #[serde(alias = "input_files", default)]
    pub input: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5sums_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_identifier: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    #[serde(default)]
    pub origin_institute: String,
    #[serde(default)]
    pub origin_contact: String,
    #[serde(default)]
    pub origin_contact_email: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    #[serde(default)]
    pub submitted_files: BTreeMap<String, DataFiles>,
}

/// Who submitted a batch and for which project.
#[derive(new, Debug, Clone)]
pub struct Origin {
    institute: String,
    contact: String,
    contact_email: String,
    project: String,
}

impl Manifest {
    pub fn new(origin: Origin) -> Self {
        Manifest {
            origin_institute: origin.institute,
            origin_contact: origin.contact,
            origin_contact_email: origin.contact_email,
            project: origin.project,
            submission_date: None,
            submitted_files: BTreeMap::new(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("could not open manifest {}", path.as_ref().display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("invalid manifest {}", path.as_ref().display()))
    }

    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("could not create manifest {}", path.as_ref().display()))?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    /// Builds a manifest from file lists. Outputs are attached to the data
    /// types that also have inputs.
    pub fn from_file_lists<P: AsRef<Path>>(
        origin: Origin,
        input_list: P,
        output_list: Option<P>,
        md5sums_file: Option<PathBuf>,
        default_type: Option<&str>,
    ) -> Result<Self> {
        let inputs = parse_file_list(input_list, default_type)?;
        let mut outputs = match output_list {
            Some(list) => parse_file_list(list, default_type)?,
            None => BTreeMap::new(),
        };

        let mut manifest = Manifest::new(origin);
        manifest.submission_date = Some(chrono::Local::now().format("%Y-%m-%d").to_string());
        for (data_type, files) in inputs {
            info!("{} input files of type {}.", files.len(), data_type);
            let output = outputs.remove(&data_type);
            manifest.submitted_files.insert(
                data_type,
                DataFiles {
                    input: files,
                    output,
                    md5sums_file: md5sums_file.clone(),
                    pair_identifier: None,
                },
            );
        }
        Ok(manifest)
    }

    /// Builds a manifest from a product status sheet: files (first column)
    /// grouped by their `Format` column.
    pub fn from_tracking_sheet<P: AsRef<Path>>(origin: Origin, sheet: P) -> Result<Self> {
        let table = Table::from_path(&sheet)?;
        let format = table.require_column("Format", "data product sheet")?;
        let mut manifest = Manifest::new(origin);
        for row in table.rows() {
            let file = row.first().map(|f| f.as_str()).unwrap_or("");
            if file.is_empty() || row[format].is_empty() {
                continue;
            }
            manifest
                .submitted_files
                .entry(row[format].clone())
                .or_insert_with(DataFiles::default)
                .input
                .push(PathBuf::from(file));
        }
        Ok(manifest)
    }

    pub fn input_files(&self, data_type: &str) -> &[PathBuf] {
        self.submitted_files
            .get(data_type)
            .map(|f| f.input.as_slice())
            .unwrap_or(&[])
    }
}

/// Parses `TYPE;PATH` or bare `PATH` lines into files grouped by data type.
pub fn parse_file_list<P: AsRef<Path>>(
    path: P,
    default_type: Option<&str>,
) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("could not read file list {}", path.as_ref().display()))?;
    let mut files: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (data_type, file) = match line.split_once(';') {
            Some((data_type, file)) => (data_type.trim().to_owned(), file.trim()),
            None => match default_type {
                Some(data_type) => (data_type.to_owned(), line),
                None => {
                    return Err(Error::UntypedManifestEntry {
                        line: line.to_owned(),
                    }
                    .into())
                }
            },
        };
        files.entry(data_type).or_insert_with(Vec::new).push(PathBuf::from(file));
    }
    Ok(files)
}
