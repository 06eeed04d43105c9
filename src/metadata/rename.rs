//! Rename sample identifiers in analysis table headers and in filenames,
//! translating between any two identifier columns of the metadata table
//! (e.g. `Site/Sub/Coll ID` to `External ID`).
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 rename-analysis-ids -m hmp2_metadata.csv -c hmp2_project.yaml \
//!     --from-id "Site/Sub/Coll ID" --to-id "External ID" -d metagenomics \
//!     pathabundance.tsv pathabundance.renamed.tsv
//! $ hmp2 rename-files -e .fastq.gz -m hmp2_metadata.csv \
//!     --from-id "Site/Sub/Coll ID" --to-id "External ID" -d metagenomics --dry-run /seq/raw
//! ```
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use derive_new::new;
use itertools::Itertools;
use log::{info, warn};

use super::DATA_TYPE;
use crate::common::{basename, mate_identifier};
use crate::errors::Error;
use crate::table::Table;

/// Maps analysis column headers from `old_id` values to `new_id` values.
///
/// Headers are matched after removing the configured fragments. The part of
/// the header after its first `_` is kept as a tag unless `keep_tag` is off.
/// Returns the mapping and the headers that could not be matched.
pub fn column_mapping(
    metadata: &Table,
    columns: &[String],
    old_id: &str,
    new_id: &str,
    patterns: &[String],
    keep_tag: bool,
) -> (Vec<(String, String)>, Vec<String>) {
    let mut mapping = Vec::new();
    let mut not_found = Vec::new();
    for column in columns {
        let clean = patterns
            .iter()
            .fold(column.clone(), |id, pattern| id.replace(pattern.as_str(), ""));
        match metadata.iter().find(|row| row.get(old_id) == clean) {
            Some(row) => {
                let mut renamed = row.get(new_id).to_owned();
                if keep_tag {
                    if let Some((_, tag)) = column.split_once('_') {
                        renamed.push('_');
                        renamed.push_str(tag);
                    }
                }
                mapping.push((column.clone(), renamed));
            }
            None => not_found.push(column.clone()),
        }
    }
    (mapping, not_found)
}

/// Rewrites the sample headers of a tab-delimited analysis file, dropping
/// columns that have no counterpart in the metadata. Data cells are copied
/// as they are.
#[allow(clippy::too_many_arguments)]
pub fn rename_analysis_ids<P: AsRef<Path>>(
    analysis_file: P,
    metadata: &Table,
    data_type: &str,
    old_id: &str,
    new_id: &str,
    patterns: &[String],
    keep_tag: bool,
    output: P,
) -> Result<usize> {
    metadata.require_column(old_id, "metadata table")?;
    metadata.require_column(new_id, "metadata table")?;

    let analysis_file = analysis_file.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(analysis_file)
        .with_context(|| format!("could not open {}", analysis_file.display()))?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(|v| v.to_owned()).collect_vec());
    }
    let header = match records.first() {
        Some(header) => header.clone(),
        None => {
            return Err(Error::SampleIds {
                file: analysis_file.display().to_string(),
            }
            .into())
        }
    };

    let subset = metadata.filter(|row| row.get(DATA_TYPE) == data_type);
    let samples = header.iter().skip(1).cloned().collect_vec();
    let (mapping, not_found) = column_mapping(&subset, &samples, old_id, new_id, patterns, keep_tag);
    for column in &not_found {
        warn!("No {} found for column {}; dropping it.", new_id, column);
    }
    let renames: HashMap<&str, &str> = mapping
        .iter()
        .map(|(old, new)| (old.as_str(), new.as_str()))
        .collect();
    let keep = (0..header.len())
        .filter(|&i| i == 0 || renames.contains_key(header[i].as_str()))
        .collect_vec();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(
            File::create(&output)
                .with_context(|| format!("could not create {}", output.as_ref().display()))?,
        );
    writer.write_record(keep.iter().map(|&i| {
        let column = header[i].as_str();
        renames.get(column).copied().unwrap_or(column)
    }))?;
    for record in records.iter().skip(1) {
        writer.write_record(keep.iter().map(|&i| record.get(i).map_or("", |v| v.as_str())))?;
    }
    writer.flush()?;

    info!(
        "Renamed {} of {} sample columns in {}.",
        keep.len() - 1,
        samples.len(),
        analysis_file.display()
    );
    Ok(keep.len() - 1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenameMode {
    Move,
    Copy,
    Symlink,
}

/// Renames files named after one metadata identifier to another.
#[derive(new)]
pub struct FileRenamer {
    from_id: String,
    to_id: String,
    data_type: String,
    pair_identifier: Option<String>,
    tag: Option<String>,
    output_dir: Option<PathBuf>,
    mode: RenameMode,
    dry_run: bool,
}

impl FileRenamer {
    /// Sample identifier a file is looked up by: the basename up to the
    /// first `.`, without mate identifiers and tag.
    fn lookup_id(&self, file: &Path) -> String {
        let name = basename(file);
        let mut id = name.split('.').next().unwrap_or("").to_owned();
        if let Some(pair) = &self.pair_identifier {
            id = id.replace(pair.as_str(), "").replace(&mate_identifier(pair), "");
        }
        if let Some(tag) = &self.tag {
            id = id.replace(tag.as_str(), "");
        }
        id
    }

    /// Renames every `*<extension>` file in `input_dir` that maps to a
    /// metadata row and returns the (source, target) pairs.
    pub fn rename_files<P: AsRef<Path>>(
        &self,
        input_dir: P,
        extension: &str,
        metadata: &Table,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        metadata.require_column(&self.from_id, "metadata table")?;
        metadata.require_column(&self.to_id, "metadata table")?;

        let pattern = input_dir.as_ref().join(format!("*{}", extension));
        let mut renamed = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let file = entry?;
            let id = self.lookup_id(&file);
            let row = metadata.iter().find(|row| {
                row.get(&self.from_id) == id && row.get(DATA_TYPE) == self.data_type
            });
            let new_id = match row.map(|row| row.get(&self.to_id)) {
                Some(new_id) if !id.is_empty() && !new_id.is_empty() => new_id,
                _ => {
                    warn!("No {} found for {}.", self.to_id, file.display());
                    continue;
                }
            };

            let dir = match &self.output_dir {
                Some(dir) => dir.clone(),
                None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
            };
            let target = dir.join(basename(&file).replace(&id, new_id));
            info!("Renaming file {} to {}", file.display(), target.display());
            if !self.dry_run {
                self.apply(&file, &target)?;
            }
            renamed.push((file, target));
        }
        Ok(renamed)
    }

    fn apply(&self, source: &Path, target: &Path) -> Result<()> {
        match self.mode {
            RenameMode::Move => fs::rename(source, target)
                .or_else(|_| fs::copy(source, target).and_then(|_| fs::remove_file(source))),
            RenameMode::Copy => fs::copy(source, target).map(|_| ()),
            RenameMode::Symlink => fs::canonicalize(source)
                .and_then(|source| std::os::unix::fs::symlink(source, target)),
        }
        .with_context(|| format!("could not rename {} to {}", source.display(), target.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = "\
Site/Sub/Coll ID,External ID,data_type
C3010C4,CSM7CRWR,metagenomics
C3010C5,CSM7CRWS,metagenomics
C3010C4,CSM7CRWX,metatranscriptomics
";

    fn metadata() -> Table {
        Table::from_reader(METADATA.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_column_mapping() {
        let columns = vec![
            "C3010C4_Abundance-RPKs".to_owned(),
            "C3010C5".to_owned(),
            "C9999C1_Abundance".to_owned(),
        ];
        let patterns = vec!["_Abundance-RPKs".to_owned(), "_Abundance".to_owned()];
        let (mapping, not_found) =
            column_mapping(&metadata(), &columns, "Site/Sub/Coll ID", "External ID", &patterns, true);
        assert_eq!(
            mapping,
            vec![
                ("C3010C4_Abundance-RPKs".to_owned(), "CSM7CRWR_Abundance-RPKs".to_owned()),
                ("C3010C5".to_owned(), "CSM7CRWS".to_owned()),
            ]
        );
        assert_eq!(not_found, vec!["C9999C1_Abundance".to_owned()]);
    }

    #[test]
    fn test_rename_analysis_ids() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("genes.tsv");
        let output = dir.path().join("genes.renamed.tsv");
        fs::write(&input, "# Gene\tC3010C4\tC9999C1\tC3010C5\ng1\t1\tNA\t3\n").unwrap();
        let renamed = rename_analysis_ids(
            &input,
            &metadata(),
            "metagenomics",
            "Site/Sub/Coll ID",
            "External ID",
            &[],
            false,
            &output,
        )
        .unwrap();
        assert_eq!(renamed, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "# Gene\tCSM7CRWR\tCSM7CRWS\ng1\t1\t3\n"
        );
    }

    #[test]
    fn test_rename_analysis_ids_keeps_cells() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pathabundance.tsv");
        let output = dir.path().join("pathabundance.renamed.tsv");
        fs::write(&input, "\tC3010C4\tC9999C1\tC3010C5\np1\tdestroyed\t0\tnan\np2\tmissed\n").unwrap();
        let renamed = rename_analysis_ids(
            &input,
            &metadata(),
            "metagenomics",
            "Site/Sub/Coll ID",
            "External ID",
            &[],
            false,
            &output,
        )
        .unwrap();
        assert_eq!(renamed, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "\tCSM7CRWR\tCSM7CRWS\np1\tdestroyed\tnan\np2\tmissed\t\n"
        );
    }

    #[test]
    fn test_symlink_into_other_dir() {
        let tmp = tempfile::tempdir_in(".").unwrap();
        // relative paths, as given on the command line
        let dir = PathBuf::from(tmp.path().file_name().unwrap());
        let input_dir = dir.join("in");
        let output_dir = dir.join("out");
        fs::create_dir(&input_dir).unwrap();
        fs::create_dir(&output_dir).unwrap();
        fs::write(input_dir.join("C3010C4.tsv"), "profile\n").unwrap();

        let renamer = FileRenamer::new(
            "Site/Sub/Coll ID".to_owned(),
            "External ID".to_owned(),
            "metagenomics".to_owned(),
            None,
            None,
            Some(output_dir.clone()),
            RenameMode::Symlink,
            false,
        );
        let done = renamer.rename_files(&input_dir, ".tsv", &metadata()).unwrap();
        let target = output_dir.join("CSM7CRWR.tsv");
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].1, target);
        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "profile\n");
    }

    #[test]
    fn test_rename_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in &["C3010C4_R1.fastq.gz", "C3010C4_R2.fastq.gz", "C0000C1_R1.fastq.gz"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let renamer = |mode, dry_run| {
            FileRenamer::new(
                "Site/Sub/Coll ID".to_owned(),
                "External ID".to_owned(),
                "metagenomics".to_owned(),
                Some("_R1".to_owned()),
                None,
                None,
                mode,
                dry_run,
            )
        };

        let planned = renamer(RenameMode::Move, true)
            .rename_files(dir.path(), ".fastq.gz", &metadata())
            .unwrap();
        assert_eq!(planned.len(), 2);
        assert!(dir.path().join("C3010C4_R1.fastq.gz").exists());

        let mut done = renamer(RenameMode::Copy, false)
            .rename_files(dir.path(), ".fastq.gz", &metadata())
            .unwrap();
        done.sort();
        assert_eq!(done[0].1, dir.path().join("CSM7CRWR_R1.fastq.gz"));
        assert!(dir.path().join("CSM7CRWR_R2.fastq.gz").exists());
        assert!(dir.path().join("C3010C4_R2.fastq.gz").exists());
    }
}
