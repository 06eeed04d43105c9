//! Split interleaved FASTQ files into one file per mate.
//!
//! ## Usage:
//!
//! Writes `out/HSM6XRQY_R1.fastq.gz` and `out/HSM6XRQY_R2.fastq.gz`.
//! ```bash
//! $ hmp2 deinterleave-fastq --compress -o out HSM6XRQY.fastq
//! ```
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use bio::io::fastq;
use log::info;
use rayon::prelude::*;

use super::{fastq_path, fastq_reader, fastq_writer};
use crate::common;

/// Writes alternating records of `input` to `<stem>_R1` and `<stem>_R2`.
pub fn deinterleave<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output_dir: Q,
    compress: bool,
) -> Result<(PathBuf, PathBuf)> {
    let stem = common::sample_id_from_fname(&input);
    let out1 = fastq_path(&output_dir, &stem, Some("R1"), compress);
    let out2 = fastq_path(&output_dir, &stem, Some("R2"), compress);

    let reader = fastq_reader(&input)?;
    let mut writers = [fastq_writer(&out1, compress)?, fastq_writer(&out2, compress)?];
    let mut n = 0;
    for result in reader.records() {
        let record: fastq::Record = result?;
        writers[n % 2].write_record(&record)?;
        n += 1;
    }
    if n % 2 == 1 {
        bail!(
            "{} holds an odd number of records and is not interleaved",
            input.as_ref().display()
        );
    }
    for writer in writers.iter_mut() {
        writer.flush()?;
    }
    info!("{}: {} read pairs.", stem, n / 2);
    Ok((out1, out2))
}

pub fn deinterleave_fastq<P: AsRef<Path> + Sync, Q: AsRef<Path> + Sync>(
    inputs: &[P],
    output_dir: Q,
    compress: bool,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    inputs
        .par_iter()
        .map(|input| deinterleave(input, &output_dir, compress))
        .collect()
}
