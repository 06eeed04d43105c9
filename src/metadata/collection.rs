//! Collection timing: week numbers, intervals between visits, biopsy visit
//! numbers and baseline clinical values.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, warn};

use super::ids::normalize_number;
use super::{is_biopsy_type, DATA_TYPE, PARTICIPANT_ID, RECEIPT_DATE, SSC_ID, VISIT_NUM, WEEK_NUM};
use crate::table::Table;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%b-%Y"];

pub const BASELINE_INTERVAL: &str = "Baseline (IBD and Healthy)";

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    // drop any time component
    let date = value.split(|c| c == ' ' || c == 'T').next().unwrap_or(value);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub number: String,
    pub date: NaiveDate,
    pub previous: Option<NaiveDate>,
}

/// Collections of each subject ordered by date of receipt.
#[derive(Debug, Default)]
pub struct CollectionDates {
    by_subject: HashMap<String, Vec<Collection>>,
}

impl CollectionDates {
    /// Groups the tracking sheet by `Subject`. Rows without a receipt date
    /// are ignored.
    pub fn from_tracking(tracking: &Table) -> Self {
        let mut by_subject: HashMap<String, Vec<Collection>> = HashMap::new();
        for row in tracking.iter() {
            let date = match parse_date(row.get(RECEIPT_DATE)) {
                Some(date) => date,
                None => continue,
            };
            by_subject
                .entry(normalize_number(row.get("Subject")))
                .or_insert_with(Vec::new)
                .push(Collection {
                    number: normalize_number(row.get("Collection #")),
                    date,
                    previous: None,
                });
        }
        for collections in by_subject.values_mut() {
            collections.sort_by_key(|c| c.date);
            let mut previous = None;
            for collection in collections.iter_mut() {
                collection.previous = previous;
                previous = Some(collection.date);
            }
        }
        CollectionDates { by_subject }
    }

    pub fn subject(&self, subject: &str) -> Option<&[Collection]> {
        self.by_subject
            .get(&normalize_number(subject))
            .map(|c| c.as_slice())
    }

    /// Weeks since the first collection and days since the previous one for
    /// a subject's collection received on `date`.
    pub fn statistics(&self, subject: &str, visit_num: &str, date: NaiveDate) -> Option<(i64, i64)> {
        let collections = self.subject(subject)?;
        let initial = collections.first()?.date;
        let visit = normalize_number(visit_num);
        let previous = collections
            .iter()
            .find(|c| c.number == visit)
            .and_then(|c| c.previous)
            .unwrap_or(initial);
        let weeks = (date - initial).num_days().div_euclid(7);
        Some((weeks, (date - previous).num_days()))
    }
}

/// Week numbers of biopsy collections per subject and interval name.
pub type BiopsyDates = HashMap<String, HashMap<String, Option<i64>>>;

/// Parses `subject,days,interval` lines; unknown days yield no week.
pub fn parse_biopsy_dates<P: AsRef<Path>>(path: P) -> Result<BiopsyDates> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("could not read biopsy dates {}", path.as_ref().display()))?;
    let mut dates = BiopsyDates::new();
    for line in content.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim().splitn(3, ',').collect();
        if fields.len() != 3 {
            warn!("Skipping malformed biopsy date line '{}'.", line);
            continue;
        }
        let week = match fields[1].trim() {
            "" | "Days Unknown" => None,
            days => Some(
                days.parse::<i64>()
                    .with_context(|| format!("invalid days value '{}'", days))?
                    .div_euclid(7),
            ),
        };
        dates
            .entry(normalize_number(fields[0]))
            .or_insert_with(HashMap::new)
            .insert(fields[2].trim().to_owned(), week);
    }
    Ok(dates)
}

/// Fills `Participant ID`, `week_num` and `interval_days`, then biopsy visit
/// numbers.
pub fn add_collection_statistics(
    metadata: &mut Table,
    collections: &CollectionDates,
    biopsy_dates: Option<&BiopsyDates>,
) {
    for idx in 0..metadata.len() {
        let ssc_id = metadata.get(idx, SSC_ID).to_owned();
        let data_type = metadata.get(idx, DATA_TYPE).to_owned();
        let participant: String = ssc_id.chars().take(5).collect();
        let subject: String = participant.chars().skip(1).collect();
        metadata.set(idx, PARTICIPANT_ID, participant);

        if is_biopsy_type(&data_type) {
            let interval = metadata.get(idx, "IntervalName").to_owned();
            if interval.contains("Baseline") {
                metadata.set(idx, WEEK_NUM, "0");
            } else if !interval.contains("Follow") {
                let week = biopsy_dates
                    .and_then(|d| d.get(&normalize_number(&subject)))
                    .and_then(|d| d.get(&interval))
                    .copied()
                    .flatten();
                match week {
                    Some(week) => metadata.set(idx, WEEK_NUM, week.to_string()),
                    None => debug!("No biopsy date for subject {} ({}).", subject, interval),
                }
            }
        } else if data_type != "host_genome" {
            let participant = match ssc_id.rfind('C') {
                Some(i) => ssc_id[..i].to_owned(),
                None => ssc_id.clone(),
            };
            metadata.set(idx, PARTICIPANT_ID, participant);

            let site = metadata.get(idx, "Site").to_owned();
            let site_name = metadata.get(idx, "SiteName").to_owned();
            if site.is_empty() {
                metadata.set(idx, "Site", site_name);
            } else if site_name.is_empty() {
                metadata.set(idx, "SiteName", site);
            }

            if metadata.get(idx, WEEK_NUM).is_empty() {
                if let Some(date) = parse_date(metadata.get(idx, RECEIPT_DATE)) {
                    let visit = metadata.get(idx, VISIT_NUM).to_owned();
                    match collections.statistics(&subject, &visit, date) {
                        Some((weeks, interval)) => {
                            metadata.set(idx, WEEK_NUM, weeks.to_string());
                            metadata.set(idx, "interval_days", interval.to_string());
                        }
                        None => warn!("No collection dates recorded for subject {}.", subject),
                    }
                }
            }
        }
    }
    add_biopsy_visit_nums(metadata);
}

/// Biopsy rows take the visit number of the participant's non-biopsy
/// collection in the same week, else the closest week, else 1.
pub fn add_biopsy_visit_nums(metadata: &mut Table) {
    let others: Vec<(String, Option<f64>, String)> = metadata
        .iter()
        .filter(|row| !is_biopsy_type(row.get(DATA_TYPE)))
        .map(|row| {
            (
                row.get(PARTICIPANT_ID).to_owned(),
                row.get(WEEK_NUM).parse::<f64>().ok(),
                row.get(VISIT_NUM).to_owned(),
            )
        })
        .collect();

    for idx in 0..metadata.len() {
        if !is_biopsy_type(metadata.get(idx, DATA_TYPE)) || !metadata.get(idx, VISIT_NUM).is_empty() {
            continue;
        }
        let participant = metadata.get(idx, PARTICIPANT_ID).to_owned();
        let visit = match metadata.get(idx, WEEK_NUM).parse::<f64>() {
            Err(_) => "1".to_owned(),
            Ok(week) => {
                let candidates = others
                    .iter()
                    .filter(|(p, w, _)| *p == participant && w.is_some())
                    .map(|(_, w, v)| ((w.unwrap_or(0.0) - week).abs(), v));
                candidates
                    .fold(None, |best: Option<(f64, &String)>, (dist, v)| match best {
                        Some((d, closest)) if d <= dist => Some((d, closest)),
                        _ => Some((dist, v)),
                    })
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| "1".to_owned())
            }
        };
        metadata.set(idx, VISIT_NUM, visit);
    }
}

/// Visit numbers of stool-derived rows from their Site/Sub/Coll id
/// (`C3010C9` is visit 9).
pub fn fill_visit_nums(metadata: &mut Table) {
    const NO_VISIT_TYPES: &[&str] = &["host_transcriptomics", "host_genome", "biopsy_16S", "methylome"];
    for idx in 0..metadata.len() {
        if metadata.get(idx, VISIT_NUM).is_empty() && !NO_VISIT_TYPES.contains(&metadata.get(idx, DATA_TYPE)) {
            let visit = metadata
                .get(idx, SSC_ID)
                .rsplit('C')
                .next()
                .unwrap_or("")
                .to_owned();
            metadata.set(idx, VISIT_NUM, visit);
        }
    }
}

/// Copies the given clinical columns recorded at the baseline visit onto
/// every metadata row of the same subject.
pub fn add_baseline_values(metadata: &mut Table, clinical: &Table, columns: &[String]) {
    if !metadata.has_column("ProjectSpecificID") {
        return;
    }
    for column in columns {
        if !clinical.has_column(column) {
            warn!("Baseline column '{}' missing from clinical metadata.", column);
            continue;
        }
        let baseline = clinical
            .filter(|row| row.get("IntervalName") == BASELINE_INTERVAL && !row.get(column).is_empty())
            .select_columns(&["ProjectSpecificID", column.as_str()]);
        metadata.update(&baseline, &["ProjectSpecificID"]);
    }
}
