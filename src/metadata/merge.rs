//! Build or update the merged HMP2 metadata table.
//!
//! Rows are generated for every file in a submission manifest by matching
//! sample ids against the Broad sample tracking sheet and the StudyTrax
//! clinical export. Biopsy, blood and serology samples that are not tracked
//! by the Broad are looked up directly in the clinical columns that record
//! them. The result is merged into an existing metadata table when given
//! and written to `hmp2_metadata_<date>.csv`.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 update-metadata -c hmp2_project.yaml -m MANIFEST.yaml \
//!     --clinical studytrax.csv --tracking broad_tracking.csv \
//!     --existing hmp2_metadata_old.csv -a supplement.tsv \
//!     --add-all-stool-collections -o out/
//! ```
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use derive_new::new;
use log::{info, warn};

use super::collection::{
    add_baseline_values, add_collection_statistics, fill_visit_nums, parse_biopsy_dates,
    BiopsyDates, CollectionDates,
};
use super::ids::{
    clean_blood_sample_id, fix_site_sub_coll_id, generate_external_id, non_stool_site_sub_coll,
    normalize_number, pdo_number, project_id, resolve_duplicate_ssc_ids, stool_site_sub_coll,
};
use super::{
    apply_supplement, read_supplement, DATA_TYPE, EXTERNAL_ID, NO_PRODUCT, PARTICIPANT_ID,
    RECEIPT_DATE, SSC, SSC_ID, VISIT_NUM,
};
use crate::common::{paired_files, sample_id_from_fname, sample_name};
use crate::config::ProjectConfig;
use crate::manifest::Manifest;
use crate::table::{Row, Table};

/// Tracking sheet columns that hold product or collection ids.
pub const TRACKING_ID_COLUMNS: &[&str] = &["Parent Sample A", "Proteomics", "MbX", "Viromics", SSC];

/// Biopsy location codes recorded for inflamed and non-inflamed samples.
pub const OTHER_LOCATIONS: &[&str] = &[
    "Terminal ileum",
    "Neo-ileum",
    "Ileocecal Valve",
    "Cecum",
    "Ascending (right-sided) colon",
    "Transverse colon",
    "Descending (left-sided) colon",
    "Sigmoid Colon",
    "Rectum",
];

/// A clinical column holding biopsy sample ids, the location it samples and,
/// for free locations, the column recording the location code.
struct BiopsyColumn {
    column: &'static str,
    location: &'static str,
    location_column: Option<&'static str>,
}

const HOST_BIOPSY_COLUMNS: &[BiopsyColumn] = &[
    BiopsyColumn { column: "bx_q5", location: "Rectum", location_column: None },
    BiopsyColumn { column: "bx_q6", location: "Ileum", location_column: None },
    BiopsyColumn { column: "bx_q7", location: "Other Inflamed", location_column: Some("bx_q8") },
    BiopsyColumn { column: "bx_q9", location: "Non-inflamed", location_column: Some("bx_q10") },
];

const AMPLICON_BIOPSY_COLUMNS: &[BiopsyColumn] = &[
    BiopsyColumn { column: "bx_q13", location: "Rectum", location_column: None },
    BiopsyColumn { column: "bx_q14", location: "Ileum", location_column: None },
    BiopsyColumn { column: "bx_q15", location: "Other Inflamed", location_column: Some("bx_q16") },
    BiopsyColumn { column: "bx_q17", location: "Non-inflamed", location_column: Some("bx_q18") },
];

/// The source sheets a metadata table is assembled from.
pub struct MetadataSources {
    pub clinical: Table,
    pub tracking: Table,
    pub proteomics: Option<Table>,
    pub biopsy_dates: Option<BiopsyDates>,
}

impl MetadataSources {
    pub fn load<P: AsRef<Path>>(
        clinical: P,
        tracking: P,
        proteomics: Option<P>,
        biopsy_dates: Option<P>,
    ) -> Result<Self> {
        let clinical = Table::from_path_with_delimiter(clinical, b',')?;
        let tracking = Table::from_path_with_delimiter(tracking, b',')?;
        for column in TRACKING_ID_COLUMNS {
            tracking.require_column(column, "sample tracking sheet")?;
        }
        Ok(MetadataSources {
            clinical,
            tracking,
            proteomics: proteomics
                .map(|p| Table::from_path_with_delimiter(p, b'\t'))
                .transpose()?,
            biopsy_dates: biopsy_dates.map(parse_biopsy_dates).transpose()?,
        })
    }
}

/// Sample ids of a batch of files keyed by sample name.
struct SampleIds {
    mapping: HashMap<String, String>,
    samples: HashSet<String>,
    techreps: HashSet<String>,
}

impl SampleIds {
    fn from_files<P: AsRef<Path>>(files: &[P], pair_identifier: Option<&str>) -> Self {
        let mut ids = SampleIds {
            mapping: HashMap::new(),
            samples: HashSet::new(),
            techreps: HashSet::new(),
        };
        for file in files {
            let name = sample_name(file, pair_identifier);
            let mut id = sample_id_from_fname(file);
            if let Some(pair_identifier) = pair_identifier {
                id = id.replace(pair_identifier, "");
            }
            if name.contains("techrep") {
                ids.techreps.insert(id.replace("_techrep", ""));
            } else {
                ids.samples.insert(id.clone());
            }
            ids.mapping.insert(name, id);
        }
        ids
    }
}

fn tracking_rows(tracking: &Table, ids: &HashSet<String>) -> Table {
    tracking.filter(|row| TRACKING_ID_COLUMNS.iter().any(|c| ids.contains(row.get(c))))
}

/// Metadata rows for one data type of a submission.
pub fn metadata_rows<P: AsRef<Path>>(
    config: &ProjectConfig,
    sources: &MetadataSources,
    data_type: &str,
    files: &[P],
    pair_identifier: Option<&str>,
) -> Result<Table> {
    let ids = SampleIds::from_files(files, pair_identifier);

    let mut tracked = if data_type != "HTX" {
        tracking_rows(&sources.tracking, &ids.samples)
    } else {
        Table::new(sources.tracking.columns().to_vec())
    };

    if !ids.techreps.is_empty() {
        let mut techreps = tracking_rows(&sources.tracking, &ids.techreps);
        techreps.map_column(EXTERNAL_ID, |row| {
            format!("{}_TR", row.get("Parent Sample A").replace('-', ""))
        });
        tracked.concat(&techreps);
    }

    let mut rows = if tracked.is_empty() {
        untracked_rows(config, &sources.clinical, data_type, &ids.samples)
    } else {
        stool_rows(sources, tracked, &ids.mapping)
    };

    let unmatched = ids
        .samples
        .iter()
        .filter(|id| !rows.iter().any(|row| row_matches(row, id)))
        .count();
    if unmatched > 0 {
        warn!("{} {} samples have no metadata.", unmatched, data_type);
    }

    let label = config.data_type_label(data_type);
    rows.map_column(DATA_TYPE, |_| label.clone());
    Ok(rows)
}

fn row_matches(row: Row<'_>, id: &str) -> bool {
    let compact = id.replace('-', "");
    row.values().iter().any(|v| v == id || *v == compact)
}

/// Tracked samples joined to their stool collection in the clinical export.
fn stool_rows(sources: &MetadataSources, tracked: Table, mapping: &HashMap<String, String>) -> Table {
    let mut rows = tracked.left_join(&sources.clinical, &["Parent Sample A"], &["st_q4"]);
    for (target, source) in &[("st_q17", "Proteomics"), ("st_q11", "MbX"), ("st_q12", "Viromics")] {
        rows.map_column(target, |row| row.opt(target).unwrap_or_else(|| row.get(source)).to_owned());
    }

    if let Some(proteomics) = &sources.proteomics {
        let exported = tracked
            .filter(|row| row.get("Proteomics status") == "EXPORTED")
            .select_columns(&["Parent Sample A", "Proteomics"]);
        let mut proteomics = proteomics.clone();
        proteomics.map_column("sample_ids", |row| {
            let dataset = row.get("Dataset");
            mapping.get(dataset).cloned().unwrap_or_else(|| dataset.to_owned())
        });
        proteomics.map_column("PDO Number", |row| {
            row.get("Dataset")
                .replace('-', "_")
                .split('_')
                .next()
                .unwrap_or("")
                .to_owned()
        });
        let mut proteomics = proteomics.left_join(&exported, &["sample_ids"], &["Proteomics"]);
        proteomics.drop_columns(&["Proteomics"]);
        rows = rows.left_join(&proteomics, &["Parent Sample A"], &["Parent Sample A"]);
        // regenerated from the stool id, technical replicates keep theirs
        rows.map_column(EXTERNAL_ID, |row| {
            let id = row.get(EXTERNAL_ID);
            if id.ends_with("_TR") {
                id.to_owned()
            } else {
                String::new()
            }
        });
    }
    rows
}

/// Biopsy, blood and serology samples looked up in the clinical export.
fn untracked_rows(
    config: &ProjectConfig,
    clinical: &Table,
    data_type: &str,
    ids: &HashSet<String>,
) -> Table {
    let mut rows = match data_type {
        "HTX" | "RRBS" => {
            let mut rows = biopsy_rows(clinical, HOST_BIOPSY_COLUMNS, ids);
            if data_type == "RRBS" {
                rows.concat(&blood_rows(clinical, "bl_q4", ids, false));
            }
            rows
        }
        "16SBP" => biopsy_rows(clinical, AMPLICON_BIOPSY_COLUMNS, ids),
        "HG" => blood_rows(clinical, "bl_q4", ids, false),
        "SER" => blood_rows(clinical, "bl_q5", ids, true),
        _ => {
            warn!("No tracked samples found for data type {}.", data_type);
            return Table::default();
        }
    };
    if rows.is_empty() {
        return rows;
    }
    rows.drop_duplicates(&[EXTERNAL_ID, "biopsy_location"], false);
    rows.map_column(SSC, |row| non_stool_site_sub_coll(row, config));
    resolve_duplicate_ssc_ids(&mut rows, SSC);
    rows
}

fn biopsy_rows(clinical: &Table, columns: &[BiopsyColumn], ids: &HashSet<String>) -> Table {
    let mut rows = Table::default();
    for biopsy in columns {
        let mut matched = clinical.filter(|row| ids.contains(row.get(biopsy.column)));
        if matched.is_empty() {
            continue;
        }
        matched.map_column("biopsy_location", |row| match biopsy.location_column {
            None => biopsy.location.to_owned(),
            Some(column) => normalize_number(row.get(column))
                .parse::<usize>()
                .ok()
                .and_then(|code| OTHER_LOCATIONS.get(code))
                .map(|l| l.to_string())
                .unwrap_or_default(),
        });
        matched.map_column(EXTERNAL_ID, |row| row.get(biopsy.column).replace('-', ""));
        rows.concat(&matched);
    }
    rows
}

fn blood_rows(clinical: &Table, column: &str, ids: &HashSet<String>, clean: bool) -> Table {
    let sample_id = |row: Row<'_>| {
        if clean {
            clean_blood_sample_id(row.get(column))
        } else {
            row.get(column).to_owned()
        }
    };
    let mut rows = clinical.filter(|row| ids.contains(&sample_id(row)));
    if clean {
        rows.map_column(column, |row| clean_blood_sample_id(row.get(column)));
        rows.map_column(EXTERNAL_ID, |row| row.get(column).to_owned());
    } else {
        rows.map_column(EXTERNAL_ID, |row| row.get(column).replace('-', ""));
    }
    rows
}

/// Fills External IDs, optionally only where missing.
fn set_external_ids(metadata: &mut Table, only_missing: bool) -> Result<()> {
    for idx in 0..metadata.len() {
        if only_missing && !metadata.get(idx, EXTERNAL_ID).is_empty() {
            continue;
        }
        if let Some(id) = generate_external_id(metadata.row(idx))? {
            metadata.set(idx, EXTERNAL_ID, id);
        }
    }
    Ok(())
}

/// Metadata rows for every data type of a manifest.
pub fn manifest_rows(
    config: &ProjectConfig,
    sources: &MetadataSources,
    manifest: &Manifest,
) -> Result<Table> {
    let mut rows = Table::default();
    for (data_type, files) in &manifest.submitted_files {
        let inputs = match &files.pair_identifier {
            Some(pair_identifier) => {
                let (first, _) = paired_files(&files.input, pair_identifier);
                if first.is_empty() {
                    files.input.clone()
                } else {
                    first
                }
            }
            None => files.input.clone(),
        };
        let dtype_rows = metadata_rows(
            config,
            sources,
            data_type,
            &inputs,
            files.pair_identifier.as_deref(),
        )?;
        info!(
            "{} metadata rows for {} {} files.",
            dtype_rows.len(),
            inputs.len(),
            data_type
        );
        rows.concat(&dtype_rows);
    }
    if rows.is_empty() {
        return Ok(rows);
    }

    rows.map_column(SSC_ID, |row| row.get(SSC).to_owned());
    if rows.has_column("Collection #") {
        rows.map_column(VISIT_NUM, |row| normalize_number(row.get("Collection #")));
    }
    rows.map_column("Project", project_id);
    rows.map_column("ProjectSpecificID", |row| normalize_number(row.get("ProjectSpecificID")));
    rows.map_column("Site", |row| row.get("SiteName").to_owned());
    set_external_ids(&mut rows, false)?;
    rows.drop_columns(&config.drop_cols.iter().map(|c| c.as_str()).collect::<Vec<_>>());
    Ok(rows)
}

/// Adds a `noproduct` row for every clinical stool collection that no data
/// product was generated from.
pub fn add_all_stool_collections(metadata: &mut Table, config: &ProjectConfig, sources: &MetadataSources) {
    let stool_key = |row: Row<'_>| {
        format!(
            "{}_{}",
            normalize_number(row.get("ProjectSpecificID")),
            normalize_number(row.get("IntervalSequence"))
        )
    };
    let is_stool = |row: &Row<'_>| row.get("IntervalName").starts_with("Stool");
    let existing: HashSet<String> = metadata.iter().filter(is_stool).map(stool_key).collect();

    let mut noproduct = sources
        .clinical
        .filter(|row| is_stool(&row) && !existing.contains(&stool_key(row)));
    noproduct.map_column(SSC_ID, |row| {
        stool_site_sub_coll(
            config.site_abbreviation(row.get("SiteName")).unwrap_or(""),
            row.get("ProjectSpecificID"),
            row.get("IntervalName"),
        )
    });
    noproduct.map_column(DATA_TYPE, |_| NO_PRODUCT.to_owned());
    noproduct.map_column("ProjectSpecificID", |row| normalize_number(row.get("ProjectSpecificID")));

    let receipts = sources.tracking.select_columns(&[SSC, RECEIPT_DATE]);
    let mut noproduct = noproduct.left_join(&receipts, &[SSC_ID], &[SSC]);
    noproduct.map_column("Site", |row| row.get("SiteName").to_owned());
    noproduct.drop_columns(&[SSC]);

    info!("Adding {} stool collections without data products.", noproduct.len());
    metadata.concat(&noproduct);
}

fn clear_values<F>(metadata: &mut Table, column: &str, invalid: F)
where
    F: Fn(&str) -> bool,
{
    if !metadata.has_column(column) {
        return;
    }
    for idx in 0..metadata.len() {
        if invalid(metadata.get(idx, column)) {
            metadata.set(idx, column, "");
        }
    }
}

fn exceeds(limit: f64) -> impl Fn(&str) -> bool {
    move |value: &str| value.parse::<f64>().map(|v| v > limit).unwrap_or(false)
}

/// Fills missing site names from the Site/Sub/Coll id prefix.
fn fix_site_names(metadata: &mut Table, config: &ProjectConfig) {
    for idx in 0..metadata.len() {
        if !metadata.get(idx, "SiteName").is_empty() {
            continue;
        }
        let abbrev: String = metadata.get(idx, SSC_ID).chars().take(1).collect();
        if let Some(name) = config.site_name(&abbrev) {
            let name = name.to_owned();
            metadata.set(idx, "SiteName", name.clone());
            metadata.set(idx, "Site", name);
        }
    }
}

/// One metadata update run.
#[derive(new)]
pub struct MetadataUpdate {
    manifest: Option<Manifest>,
    existing: Option<PathBuf>,
    auxiliary: Vec<PathBuf>,
    add_all_stool_collections: bool,
}

impl MetadataUpdate {
    pub fn run(&self, config: &ProjectConfig, sources: &MetadataSources) -> Result<Table> {
        let new_rows = match &self.manifest {
            Some(manifest) => manifest_rows(config, sources, manifest)?,
            None => Table::default(),
        };

        let mut metadata = match &self.existing {
            Some(path) => {
                let mut existing = Table::from_path_with_delimiter(path, b',')?;
                existing.map_column(SSC_ID, |row| {
                    fix_site_sub_coll_id(row.get(SSC_ID), row.get("SiteName"), config)
                });
                existing.map_column("PDO Number", pdo_number);
                if !new_rows.is_empty() {
                    existing.concat(&new_rows);
                    existing.drop_duplicates(&[EXTERNAL_ID, SSC_ID, DATA_TYPE], true);
                }
                existing
            }
            None => new_rows,
        };
        if metadata.is_empty() {
            bail!("no metadata rows found for the submitted files and no existing metadata given");
        }

        set_external_ids(&mut metadata, true)?;

        for path in &self.auxiliary {
            let supplement = read_supplement(path)?;
            apply_supplement(&mut metadata, &supplement, path);
        }

        if self.add_all_stool_collections {
            add_all_stool_collections(&mut metadata, config, sources);
        }

        fill_visit_nums(&mut metadata);

        if metadata.has_column("Site") {
            metadata.map_column("SiteName", |row| {
                row.opt("Site").unwrap_or_else(|| row.get("SiteName")).to_owned()
            });
        } else {
            metadata.map_column("Site", |row| row.get("SiteName").to_owned());
        }

        clear_values(&mut metadata, "hbi_score", exceeds(900.0));
        clear_values(&mut metadata, "consent_age", exceeds(150.0));
        clear_values(&mut metadata, "total_reads", |v| v.starts_with("PDO"));
        let project = config.research_project.clone();
        metadata.map_column("Research Project", |_| project.clone());

        let collections = CollectionDates::from_tracking(&sources.tracking);
        add_collection_statistics(&mut metadata, &collections, sources.biopsy_dates.as_ref());
        add_baseline_values(&mut metadata, &sources.clinical, &config.baseline_cols);
        fix_site_names(&mut metadata, config);

        metadata.reorder_columns(&config.col_order);
        metadata.drop_columns(&["Site"]);
        metadata.sort_by_columns(&[DATA_TYPE, PARTICIPANT_ID, VISIT_NUM]);
        info!("{} metadata rows.", metadata.len());
        Ok(metadata)
    }
}

/// Writes the table to `<output_dir>/hmp2_metadata_<YYYY-MM-DD>.csv`.
pub fn write_metadata<P: AsRef<Path>>(metadata: &Table, output_dir: P) -> Result<PathBuf> {
    let path = output_dir.as_ref().join(format!(
        "hmp2_metadata_{}.csv",
        chrono::Local::now().format("%Y-%m-%d")
    ));
    metadata.to_path_with_delimiter(&path, b',', "")?;
    info!("Metadata written to {}.", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DataFiles;

    const CLINICAL: &str = "\
ProjectSpecificID,SiteName,IntervalName,IntervalSequence,st_q4,st_q11,bl_q4,bx_q5,bx_q7,bx_q8,hbi_score,diagnosis
3010,Cedars-Sinai,Stool Collection #1,1,SM-AAAA,,,,,,3,
3010,Cedars-Sinai,Stool Collection #2,2,SM-BBBB,,,,,,999,
3010,Cedars-Sinai,Screening Colonoscopy,0,,,,SM-R001,SM-O001,4,,
3010,Cedars-Sinai,Baseline (IBD and Healthy),0,,,SM-BL01,,,,,CD
3010,Cedars-Sinai,Stool Collection #3,3,SM-CCCC,,,,,,,
";

    const TRACKING: &str = "\
Subject,Collection #,Site/Sub/Coll,Parent Sample A,Proteomics,MbX,Viromics,Actual Date of Receipt,Proteomics status
3010,1,C3010C1,SM-AAAA,,SM-MBX1,,2014-01-01,
3010,2,C3010C2,SM-BBBB,,,,2014-01-15,
3010,3,C3010C3,SM-CCCC,,,,2014-02-12,
";

    fn sources() -> MetadataSources {
        MetadataSources {
            clinical: Table::from_reader(CLINICAL.as_bytes(), b',').unwrap(),
            tracking: Table::from_reader(TRACKING.as_bytes(), b',').unwrap(),
            proteomics: None,
            biopsy_dates: None,
        }
    }

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/seq/{}", n))).collect()
    }

    fn manifest() -> Manifest {
        let mut manifest = Manifest::default();
        manifest.submitted_files.insert(
            "MGX".to_owned(),
            DataFiles {
                input: files(&["SM-AAAA_R1.fastq", "SM-AAAA_R2.fastq", "SM-BBBB_R1.fastq", "SM-BBBB_R2.fastq"]),
                pair_identifier: Some("_R1".to_owned()),
                ..Default::default()
            },
        );
        manifest.submitted_files.insert(
            "HTX".to_owned(),
            DataFiles {
                input: files(&["SM-R001.bam", "SM-O001.bam"]),
                ..Default::default()
            },
        );
        manifest.submitted_files.insert(
            "HG".to_owned(),
            DataFiles {
                input: files(&["SM-BL01.bam"]),
                ..Default::default()
            },
        );
        manifest
    }

    fn find<'a>(metadata: &'a Table, external_id: &str) -> Row<'a> {
        metadata
            .iter()
            .find(|row| row.get(EXTERNAL_ID) == external_id)
            .unwrap()
    }

    #[test]
    fn test_stool_rows() {
        let config = ProjectConfig::default();
        let rows = metadata_rows(
            &config,
            &sources(),
            "MGX",
            &files(&["SM-AAAA_R1.fastq", "SM-BBBB_R1.fastq"]),
            Some("_R1"),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(0, "IntervalName"), "Stool Collection #1");
        assert_eq!(rows.get(0, "st_q11"), "SM-MBX1");
        assert_eq!(rows.get(0, DATA_TYPE), "metagenomics");
    }

    #[test]
    fn test_biopsy_rows() {
        let config = ProjectConfig::default();
        let rows = metadata_rows(&config, &sources(), "HTX", &files(&["SM-R001.bam", "SM-O001.bam"]), None)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.column_values("biopsy_location"), vec!["Rectum", "Ascending (right-sided) colon"]);
        assert_eq!(rows.column_values(SSC), vec!["C3010CSC1", "C3010CSC2"]);
        assert_eq!(rows.column_values(EXTERNAL_ID), vec!["SMR001", "SMO001"]);
    }

    #[test]
    fn test_update_metadata() {
        let mut config = ProjectConfig::default();
        config.baseline_cols = vec!["diagnosis".to_owned()];
        config.col_order = vec![EXTERNAL_ID.to_owned(), PARTICIPANT_ID.to_owned()];
        let update = MetadataUpdate::new(Some(manifest()), None, vec![], true);
        let metadata = update.run(&config, &sources()).unwrap();

        assert_eq!(&metadata.columns()[..2], &[EXTERNAL_ID, PARTICIPANT_ID]);
        assert!(!metadata.has_column("Site"));
        assert_eq!(
            metadata.column_values(DATA_TYPE),
            vec![
                "host_genome",
                "host_transcriptomics",
                "host_transcriptomics",
                "metagenomics",
                "metagenomics",
                NO_PRODUCT
            ]
        );

        let stool = find(&metadata, "CSMBBBB");
        assert_eq!(stool.get(SSC_ID), "C3010C2");
        assert_eq!(stool.get(VISIT_NUM), "2");
        assert_eq!(stool.get("week_num"), "2");
        assert_eq!(stool.get("interval_days"), "14");
        assert_eq!(stool.get("hbi_score"), "");
        assert_eq!(stool.get("Project"), "C3010C2_MGX");
        assert_eq!(stool.get("diagnosis"), "CD");
        assert_eq!(stool.get("Research Project"), "ibdmdb");

        let biopsy = find(&metadata, "CSMO001");
        assert_eq!(biopsy.get(PARTICIPANT_ID), "C3010");
        assert_eq!(biopsy.get(VISIT_NUM), "1");
        assert_eq!(biopsy.get("diagnosis"), "CD");

        let blood = find(&metadata, "CSMBL01");
        assert_eq!(blood.get(SSC_ID), "C3010CBL1");
        assert_eq!(blood.get("SiteName"), "Cedars-Sinai");

        let noproduct = metadata.row(metadata.len() - 1);
        assert_eq!(noproduct.get(SSC_ID), "C3010C3");
        assert_eq!(noproduct.get(VISIT_NUM), "3");
        assert_eq!(noproduct.get("week_num"), "6");
        assert_eq!(noproduct.get(EXTERNAL_ID), "");
    }

    #[test]
    fn test_update_existing_keeps_latest() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("old.csv");
        std::fs::write(
            &existing,
            "External ID,Site/Sub/Coll ID,data_type,SiteName,week_num,note\n\
             CSMAAAA,3010C1,metagenomics,Cedars-Sinai,0,old\n\
             CSMZZZZ,C3010C1,metabolomics,Cedars-Sinai,0,kept\n",
        )
        .unwrap();
        let mut manifest = Manifest::default();
        manifest.submitted_files.insert(
            "MGX".to_owned(),
            DataFiles {
                input: files(&["SM-AAAA.fastq.gz"]),
                ..Default::default()
            },
        );
        let update = MetadataUpdate::new(Some(manifest), Some(existing), vec![], false);
        let metadata = update.run(&ProjectConfig::default(), &sources()).unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(find(&metadata, "CSMAAAA").get("note"), "");
        assert_eq!(find(&metadata, "CSMZZZZ").get("note"), "kept");
    }
}
