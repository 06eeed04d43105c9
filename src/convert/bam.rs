//! Convert BAM files (e.g. host transcriptome alignments) back into FASTQ.
//!
//! Only primary alignments are written. Reads aligned to the reverse strand
//! are reverse complemented to restore the sequenced orientation, and mates
//! get `/1` and `/2` suffixes.
//!
//! ## Usage:
//!
//! Interleaved output `out/SM-9OSWF.fastq`:
//! ```bash
//! $ hmp2 bam-to-fastq -o out SM-9OSWF.bam
//! ```
//!
//! Paired output `out/fastq/SM-9OSWF_R1.fastq.gz` and `_R2.fastq.gz`:
//! ```bash
//! $ hmp2 bam-to-fastq --paired-end --compress -o out SM-9OSWF.bam
//! ```
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bio::alphabets::dna;
use derive_new::new;
use log::{info, warn};
use rayon::prelude::*;
use rust_htslib::bam;
use rust_htslib::bam::Read;

use super::{fastq_path, fastq_writer, FastqWriter};
use crate::common;

#[derive(Debug, Clone, PartialEq)]
pub struct FastqRead {
    pub name: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRead {
    pub fn from_record(record: &bam::Record) -> Self {
        let mut name = String::from_utf8_lossy(record.qname()).into_owned();
        if record.is_paired() {
            if record.is_first_in_template() {
                name.push_str("/1");
            } else if record.is_last_in_template() {
                name.push_str("/2");
            }
        }
        let mut seq = record.seq().as_bytes();
        let mut qual: Vec<u8> = record
            .qual()
            .iter()
            .map(|&q| if q == 255 { b'!' } else { q.saturating_add(33) })
            .collect();
        if record.is_reverse() {
            seq = dna::revcomp(&seq);
            qual.reverse();
        }
        FastqRead { name, seq, qual }
    }

    fn write(&self, writer: &mut FastqWriter) -> Result<()> {
        writer.write(&self.name, None, &self.seq, &self.qual)?;
        Ok(())
    }
}

pub fn is_primary(record: &bam::Record) -> bool {
    !record.is_secondary() && !record.is_supplementary()
}

#[derive(new, Debug, Clone)]
pub struct BamToFastq {
    output_dir: PathBuf,
    paired_end: bool,
    compress: bool,
}

impl BamToFastq {
    /// Output files for `bam`: one interleaved file, or one per mate in a
    /// `fastq` subfolder.
    pub fn output_files<P: AsRef<Path>>(&self, bam: P) -> Result<Vec<PathBuf>> {
        let stem = common::sample_name(&bam, Some(".bam"));
        if self.paired_end {
            let dir = self.output_dir.join("fastq");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("could not create directory {}", dir.display()))?;
            Ok(vec![
                fastq_path(&dir, &stem, Some("R1"), self.compress),
                fastq_path(&dir, &stem, Some("R2"), self.compress),
            ])
        } else {
            Ok(vec![fastq_path(&self.output_dir, &stem, None, self.compress)])
        }
    }

    /// Converts a single file. Mates are written next to each other, or to
    /// their own file in paired-end mode; a mate whose partner is missing is
    /// dropped in paired-end mode.
    pub fn convert<P: AsRef<Path>>(&self, bam_path: P) -> Result<Vec<PathBuf>> {
        let outputs = self.output_files(&bam_path)?;
        let mut writers = outputs
            .iter()
            .map(|path| fastq_writer(path, self.compress))
            .collect::<Result<Vec<_>>>()?;
        let mut reader = bam::Reader::from_path(&bam_path)
            .with_context(|| format!("could not open {}", bam_path.as_ref().display()))?;

        let mut pending: HashMap<Vec<u8>, (bool, FastqRead)> = HashMap::new();
        let mut written = 0;
        for result in reader.records() {
            let record = result?;
            if !is_primary(&record) {
                continue;
            }
            let read = FastqRead::from_record(&record);
            if !record.is_paired() {
                if self.paired_end {
                    warn!("Skipping unpaired read {} in paired-end mode.", read.name);
                } else {
                    read.write(&mut writers[0])?;
                    written += 1;
                }
                continue;
            }
            let first = record.is_first_in_template();
            match pending.remove(record.qname()) {
                Some((mate_first, mate)) => {
                    let (r1, r2) = if mate_first { (mate, read) } else { (read, mate) };
                    let second = if self.paired_end { 1 } else { 0 };
                    r1.write(&mut writers[0])?;
                    r2.write(&mut writers[second])?;
                    written += 2;
                }
                None => {
                    pending.insert(record.qname().to_owned(), (first, read));
                }
            }
        }

        if !pending.is_empty() {
            if self.paired_end {
                warn!(
                    "{}: dropped {} reads without mate.",
                    bam_path.as_ref().display(),
                    pending.len()
                );
            } else {
                let mut orphans: Vec<_> = pending.into_iter().map(|(_, (_, read))| read).collect();
                orphans.sort_by(|a, b| a.name.cmp(&b.name));
                for read in orphans {
                    read.write(&mut writers[0])?;
                    written += 1;
                }
            }
        }
        for writer in writers.iter_mut() {
            writer.flush()?;
        }
        info!("{}: wrote {} reads.", bam_path.as_ref().display(), written);
        Ok(outputs)
    }
}

/// Converts all `bams` in parallel.
pub fn bam_to_fastq<P: AsRef<Path> + Sync>(bams: &[P], converter: &BamToFastq) -> Result<Vec<PathBuf>> {
    let outputs = bams
        .par_iter()
        .map(|bam| converter.convert(bam))
        .collect::<Result<Vec<_>>>()?;
    Ok(outputs.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let converter = BamToFastq::new(dir.path().to_owned(), true, true);
        let outputs = converter.output_files("/data/SM-9OSWF.bam").unwrap();
        assert_eq!(
            outputs,
            vec![
                dir.path().join("fastq/SM-9OSWF_R1.fastq.gz"),
                dir.path().join("fastq/SM-9OSWF_R2.fastq.gz"),
            ]
        );
        assert!(dir.path().join("fastq").is_dir());

        let converter = BamToFastq::new(dir.path().to_owned(), false, false);
        assert_eq!(
            converter.output_files("SM-9OSWF.bam").unwrap(),
            vec![dir.path().join("SM-9OSWF.fastq")]
        );
    }
}
