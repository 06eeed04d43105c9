//! Identifier reconciliation between the clinical (StudyTrax) export, the
//! Broad sample tracking sheet and submitted data files.
use std::collections::BTreeMap;

use itertools::Itertools;
use log::warn;

use super::{DATA_TYPE, EXTERNAL_ID, NO_PRODUCT, SSC, SSC_ID};
use crate::config::ProjectConfig;
use crate::errors::Error;
use crate::table::{Row, Table};

/// Single-character substitutions tried when an id does not match as given,
/// covering common transcription errors in hand-entered sample ids.
pub const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("1", "I"),
    ("O", "0"),
    ("I", "1"),
    ("0", "O"),
    ("SM-", "SM"),
];

/// Collection interval codes used in non-stool Site/Sub/Coll ids.
const INTERVAL_CODES: &[(&str, &str)] = &[
    ("Screening Colonoscopy", "SC"),
    ("Additional Biopsy", "B"),
    ("Baseline (IBD and Healthy)", "BL"),
];

/// Data type labels to the suffix used in generated project ids.
const PROJECT_CODES: &[(&str, &str)] = &[
    ("host_transcriptomics", "HTX"),
    ("biopsy_16S", "BP"),
    ("metatranscriptomics", "MTX"),
    ("metagenomics", "MGX"),
    ("viromics", "MVX"),
    ("host_genome", "HG"),
    ("methylome", "RRBS"),
    ("serology", "SER"),
];

/// Normalizes numeric identifiers so that `3010`, `3010.0` and ` 3010`
/// compare equal.
pub fn normalize_number(value: &str) -> String {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        _ => value.to_owned(),
    }
}

/// Site/Sub/Coll id of a stool collection, e.g. `C3010C4` for the fourth
/// stool collection of subject 3010 at Cedars-Sinai.
pub fn stool_site_sub_coll(site_abbrev: &str, subject: &str, interval_name: &str) -> String {
    format!(
        "{}{}C{}",
        site_abbrev,
        normalize_number(subject),
        interval_name.replace("Stool Collection #", "").trim()
    )
}

/// Site/Sub/Coll id of a biopsy or blood collection, built from the site,
/// subject and visit interval (`M2026CSC1`, `E5001CFU12`).
pub fn non_stool_site_sub_coll(row: Row<'_>, config: &ProjectConfig) -> String {
    let interval_name = row.get("IntervalName");
    let site = config.site_abbreviation(row.get("SiteName")).unwrap_or_else(|| {
        warn!("Unknown site '{}' for subject {}.", row.get("SiteName"), row.get("ProjectSpecificID"));
        ""
    });

    let lower = interval_name.to_lowercase();
    let (code, coll_num) = if lower.contains("follow-up") {
        let month = lower
            .replace("follow-up (month ", "")
            .replace(')', "")
            .trim()
            .to_owned();
        ("FU", month)
    } else {
        let code = INTERVAL_CODES
            .iter()
            .find(|(name, _)| *name == interval_name)
            .map(|(_, code)| *code)
            .unwrap_or_else(|| {
                warn!("No collection code for interval '{}'.", interval_name);
                ""
            });
        (code, "1".to_owned())
    };

    format!(
        "{}{}C{}{}",
        site,
        normalize_number(row.get("ProjectSpecificID")),
        code,
        coll_num
    )
}

/// Gives repeated Site/Sub/Coll ids a distinguishing trailing counter: the
/// first occurrence is kept, the k-th gets its last character replaced by k.
pub fn resolve_duplicate_ssc_ids(table: &mut Table, column: &str) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, id) in table.column_values(column).into_iter().enumerate() {
        if !id.is_empty() {
            groups.entry(id.to_owned()).or_insert_with(Vec::new).push(idx);
        }
    }
    for (id, rows) in groups.into_iter().filter(|(_, rows)| rows.len() > 1) {
        let mut stem = id.clone();
        stem.pop();
        for (k, &idx) in rows.iter().enumerate().skip(1) {
            table.set(idx, column, format!("{}{}", stem, k + 1));
        }
    }
}

/// External ID of a metadata row: the site letter followed by the existing
/// External ID, stool id (`st_q4`) or blood id (`bl_q4`) without dashes.
/// Rows without a data product have none.
pub fn generate_external_id(row: Row<'_>) -> Result<Option<String>, Error> {
    if row.get(DATA_TYPE) == NO_PRODUCT {
        return Ok(None);
    }
    let base = row
        .opt(EXTERNAL_ID)
        .or_else(|| row.opt("st_q4"))
        .or_else(|| row.opt("bl_q4"))
        .ok_or_else(|| Error::ExternalId {
            row: row.describe(),
        })?;
    let site = row.get(SSC_ID).chars().next().map(String::from).unwrap_or_default();
    Ok(Some(format!("{}{}", site, base.replace('-', ""))))
}

/// Prefixes the site abbreviation to Site/Sub/Coll ids that lack it.
pub fn fix_site_sub_coll_id(ssc_id: &str, site_name: &str, config: &ProjectConfig) -> String {
    match ssc_id.chars().next() {
        Some(c) if c.is_ascii_digit() => match config.site_abbreviation(site_name) {
            Some(abbrev) => format!("{}{}", abbrev, ssc_id),
            None => ssc_id.to_owned(),
        },
        _ => ssc_id.to_owned(),
    }
}

/// Strips the aliquot suffixes found on hand-entered serology sample ids.
pub fn clean_blood_sample_id(sample_id: &str) -> String {
    [" 1", "-1", "s1", "S1", ".1"]
        .iter()
        .fold(sample_id.to_owned(), |id, suffix| id.replace(suffix, ""))
}

/// All single-substitution variants of an id.
pub fn substitution_variants(sample_id: &str) -> Vec<String> {
    SUBSTITUTIONS
        .iter()
        .filter(|(from, _)| sample_id.contains(from))
        .map(|(from, to)| sample_id.replace(from, to))
        .unique()
        .collect()
}

/// Project id of a row: the proteomics `Job` when no project is set,
/// otherwise the Site/Sub/Coll id with the data type suffix.
pub fn project_id(row: Row<'_>) -> String {
    if row.opt("Project").is_none() {
        if let Some(job) = row.opt("Job") {
            return job.to_owned();
        }
    }
    let data_type = row.get(DATA_TYPE);
    match PROJECT_CODES.iter().find(|(label, _)| *label == data_type) {
        Some((_, code)) => format!("{}_{}", row.get(SSC), code),
        None => row.get("Project").to_owned(),
    }
}

/// PDO number of a row; proteomics raw files carry their batch number in the
/// filename and amplicon numbers are `PDO-` prefixed.
pub fn pdo_number(row: Row<'_>) -> String {
    let pdo = row.get("PDO Number");
    let project = row.get("Project");
    let data_type = row.get(DATA_TYPE);

    if project.contains(".raw") && data_type == "proteomics" {
        let filename = crate::common::basename(project).replace('_', "-");
        let batch = filename.split('-').next().unwrap_or("");
        if !batch.is_empty() && batch.chars().all(|c| c.is_ascii_digit()) {
            return batch.to_owned();
        }
    } else if data_type == "amplicon" && !pdo.is_empty() && !pdo.contains("PDO") {
        return format!("PDO-{}", pdo);
    }
    pdo.to_owned()
}
