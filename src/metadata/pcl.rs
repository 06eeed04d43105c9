//! Attach metadata to analysis products.
//!
//! Analysis tables (one feature column followed by one column per sample)
//! are turned into PCL files: the header, one row per metadata field, an
//! empty separator row and then the original feature rows.
//!
//! ```text
//! # Feature      SampleA   SampleB
//! week_num       0         2
//! diagnosis      CD        nonIBD
//!
//! Bacteria       1.0       1.0
//! ```
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 add-metadata-to-tsv -m hmp2_metadata.csv -c hmp2_project.yaml \
//!     --section MGX -d metagenomics taxonomic_profiles.tsv
//! ```
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use derive_new::new;
use itertools::Itertools;
use log::{info, warn};

use super::{apply_supplement, DATA_TYPE};
use crate::common::{name_file, name_file_in_subfolder, sample_name};
use crate::errors::Error;
use crate::table::Table;

/// Decorates analysis files of one data type with metadata.
#[derive(new)]
pub struct MetadataDecorator {
    metadata: Table,
    data_type: String,
    id_col: String,
    col_patterns: Vec<String>,
    target_cols: Vec<String>,
    supplements: Vec<(PathBuf, Table)>,
    drop_missing_cols: bool,
    feature_columns: usize,
}

impl MetadataDecorator {
    /// Writes `<stem>.pcl.tsv` next to the analysis file and returns its path.
    pub fn decorate<P: AsRef<Path>>(&self, analysis_file: P) -> Result<PathBuf> {
        let analysis_file = analysis_file.as_ref();
        let delimiter = match analysis_file.extension().and_then(|e| e.to_str()) {
            Some("csv") => b',',
            _ => b'\t',
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(analysis_file)
            .with_context(|| format!("could not open {}", analysis_file.display()))?;
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(|v| v.to_owned()).collect_vec());
        }
        let width = records.iter().map(|r| r.len()).max().unwrap_or(0);
        let analysis = Table::from_rows((0..width).map(|i| i.to_string()).collect(), records)
            .reset_column_headers();
        let mut header = analysis.columns().to_vec();
        let offset = self.feature_columns.min(header.len());
        if header.len() <= offset {
            return bail_sample_ids(analysis_file);
        }

        for id in header.iter_mut().skip(offset) {
            *id = self.clean_id(id);
        }
        let sample_ids: Vec<String> = header[offset..].to_vec();
        let id_set: HashSet<&str> = sample_ids.iter().map(|s| s.as_str()).collect();

        let subset = self.sample_metadata(&id_set);
        let values: HashMap<&str, usize> = subset
            .iter()
            .map(|row| (row.get(&self.id_col), row.index()))
            .collect();
        info!(
            "{} of {} samples in {} have metadata.",
            values.len(),
            sample_ids.len(),
            analysis_file.display()
        );
        if values.is_empty() {
            return Err(Error::NoSampleMetadata {
                samples: sample_ids.join(","),
            }
            .into());
        }

        let keep: Vec<usize> = (0..header.len())
            .filter(|&i| i < offset || !self.drop_missing_cols || values.contains_key(header[i].as_str()))
            .collect();

        let out_dir = analysis_file.parent().unwrap_or_else(|| Path::new("."));
        let out_path = name_file(out_dir, &sample_name(analysis_file, None), None, Some("pcl.tsv"));
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_writer(File::create(&out_path)?);

        let select = |row: &[String]| {
            keep.iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect_vec()
        };
        writer.write_record(select(&header))?;
        for field in subset.columns().iter().filter(|c| **c != self.id_col) {
            let mut row = vec!["NA".to_owned(); header.len()];
            row[0] = field.clone();
            for (i, id) in header.iter().enumerate().skip(offset) {
                if let Some(&idx) = values.get(id.as_str()) {
                    let value = subset.get(idx, field);
                    if !value.is_empty() {
                        row[i] = value.to_owned();
                    }
                }
            }
            writer.write_record(select(&row))?;
        }
        writer.write_record(vec![""; keep.len()])?;
        for record in analysis.rows() {
            writer.write_record(select(record))?;
        }
        writer.flush()?;
        Ok(out_path)
    }

    fn clean_id(&self, id: &str) -> String {
        self.col_patterns
            .iter()
            .fold(id.to_owned(), |id, pattern| id.replace(pattern.as_str(), ""))
    }

    /// Metadata rows of this data type for the given ids, with supplements
    /// merged and restricted to the target columns.
    fn sample_metadata(&self, ids: &HashSet<&str>) -> Table {
        let mut subset = self.metadata.filter(|row| {
            row.get(DATA_TYPE) == self.data_type && ids.contains(row.get(&self.id_col))
        });
        for (path, supplement) in &self.supplements {
            let key = supplement.columns().first().cloned().unwrap_or_default();
            let supplement = supplement.filter(|row| ids.contains(row.get(&key)));
            apply_supplement(&mut subset, &supplement, path);
        }
        if !self.target_cols.is_empty() {
            let columns = std::iter::once(self.id_col.as_str())
                .chain(self.target_cols.iter().map(|c| c.as_str()))
                .unique()
                .collect_vec();
            subset = subset.select_columns(&columns);
        }
        subset.drop_duplicates(&[self.id_col.as_str()], false);
        subset
    }
}

fn bail_sample_ids<T>(file: &Path) -> Result<T> {
    Err(Error::SampleIds {
        file: file.display().to_string(),
    }
    .into())
}

/// Writes one CSV per sample (header plus the sample's row) to
/// `<output_dir>/metadata/<sample>.csv`.
pub fn write_sample_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    metadata: &Table,
    data_type: &str,
    files: &[P],
    output_dir: Q,
    id_col: &str,
) -> Result<Vec<PathBuf>> {
    let samples: Vec<String> = files.iter().map(|f| sample_name(f, None)).collect();
    let sample_set: HashSet<&str> = samples.iter().map(|s| s.as_str()).collect();
    let subset = metadata.filter(|row| {
        row.get(DATA_TYPE) == data_type && sample_set.contains(row.get(id_col))
    });
    if subset.is_empty() {
        return Err(Error::NoSampleMetadata {
            samples: samples.join(","),
        }
        .into());
    }

    let mut written = Vec::new();
    for row in subset.iter() {
        let sample = row.get(id_col);
        let path = name_file_in_subfolder(&output_dir, "metadata", sample, None, Some("csv"))?;
        subset.select_rows(&[row.index()]).to_path_with_delimiter(&path, b',', "")?;
        written.push(path);
    }
    let missing = samples.len() - written.len().min(samples.len());
    if missing > 0 {
        warn!("{} samples have no {} metadata.", missing, data_type);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const METADATA: &str = "\
External ID,data_type,week_num,diagnosis
CSMA,metagenomics,0,CD
CSMB,metagenomics,2,
CSMA,metabolomics,9,UC
";

    fn decorator(drop_missing_cols: bool, supplements: Vec<(PathBuf, Table)>) -> MetadataDecorator {
        MetadataDecorator::new(
            Table::from_reader(METADATA.as_bytes(), b',').unwrap(),
            "metagenomics".to_owned(),
            "External ID".to_owned(),
            vec!["_taxonomic_profile".to_owned()],
            vec![],
            supplements,
            drop_missing_cols,
            1,
        )
    }

    #[test]
    fn test_decorate() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = dir.path().join("taxa.tsv");
        fs::write(
            &analysis,
            "# Feature\tCSMA_taxonomic_profile\tCSMB_taxonomic_profile\tCSMC_taxonomic_profile\n\
             k__Bacteria\t1.0\t0.5\t0.2\n",
        )
        .unwrap();
        let out = decorator(false, vec![]).decorate(&analysis).unwrap();
        assert_eq!(out, dir.path().join("taxa.pcl.tsv"));
        assert_eq!(
            fs::read_to_string(out).unwrap(),
            "# Feature\tCSMA\tCSMB\tCSMC\n\
             data_type\tmetagenomics\tmetagenomics\tNA\n\
             week_num\t0\t2\tNA\n\
             diagnosis\tCD\tNA\tNA\n\
             \t\t\t\n\
             k__Bacteria\t1.0\t0.5\t0.2\n"
        );
    }

    #[test]
    fn test_decorate_drop_missing_with_supplement() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = dir.path().join("taxa.csv");
        fs::write(&analysis, "Feature,CSMA,CSMC\nk__Bacteria,1,2\n").unwrap();
        let supplement = Table::from_reader("External ID\treads\nCSMA\t100\n".as_bytes(), b'\t').unwrap();
        let out = decorator(true, vec![(PathBuf::from("reads.tsv"), supplement)])
            .decorate(&analysis)
            .unwrap();
        let content = fs::read_to_string(out).unwrap();
        assert!(content.starts_with("Feature\tCSMA\n"));
        assert!(content.contains("reads\t100\n"));
        assert!(content.ends_with("\n\t\nk__Bacteria\t1\n"));
    }

    #[test]
    fn test_decorate_without_matching_samples() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = dir.path().join("taxa.tsv");
        fs::write(&analysis, "# Feature\tCSMX\tCSMY\nk__Bacteria\t1\t2\n").unwrap();
        let err = decorator(false, vec![]).decorate(&analysis).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSampleMetadata { .. })));
        assert!(!dir.path().join("taxa.pcl.tsv").exists());

        let features_only = dir.path().join("features.tsv");
        fs::write(&features_only, "# Feature\nk__Bacteria\n").unwrap();
        let err = decorator(false, vec![]).decorate(&features_only).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::SampleIds { .. })));
    }

    #[test]
    fn test_decorate_keeps_repeated_sample_columns() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = dir.path().join("taxa.tsv");
        fs::write(&analysis, "# Feature\tCSMA\tCSMA\nk__Bacteria\t1\t2\n").unwrap();
        let out = decorator(false, vec![]).decorate(&analysis).unwrap();
        let content = fs::read_to_string(out).unwrap();
        assert!(content.starts_with("# Feature\tCSMA\tCSMA.1\n"));
        assert!(content.ends_with("k__Bacteria\t1\t2\n"));
    }

    #[test]
    fn test_sample_metadata_files() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Table::from_reader(METADATA.as_bytes(), b',').unwrap();
        let files = vec![PathBuf::from("/seq/CSMA.bam"), PathBuf::from("/seq/CSMX.bam")];
        let written = write_sample_metadata(
            &metadata,
            "metagenomics",
            &files,
            dir.path(),
            "External ID",
        )
        .unwrap();
        assert_eq!(written, vec![dir.path().join("metadata").join("CSMA.csv")]);
        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "External ID,data_type,week_num,diagnosis\nCSMA,metagenomics,0,CD\n"
        );

        let none = vec![PathBuf::from("/seq/CSMX.bam")];
        assert!(write_sample_metadata(&metadata, "metagenomics", &none, dir.path(), "External ID").is_err());
    }
}
