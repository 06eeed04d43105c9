//! Format conversions applied to sequencing and analysis products before
//! they are disseminated.
pub mod abundance;
pub mod bam;
pub mod biom;
pub mod excel;
pub mod fastq;
pub mod otu;

use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bio::io::fastq as bio_fastq;
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::common;

pub type FastqWriter = bio_fastq::Writer<Box<dyn Write>>;

/// Output path `<dir>/<stem>[_<tag>].fastq[.gz]`.
pub fn fastq_path<P: AsRef<Path>>(dir: P, stem: &str, tag: Option<&str>, compress: bool) -> PathBuf {
    let extension = if compress { "fastq.gz" } else { "fastq" };
    common::name_file(dir, stem, tag, Some(extension))
}

/// Opens a FASTQ writer, gzip compressed when `compress` is set.
pub fn fastq_writer<P: AsRef<Path>>(path: P, compress: bool) -> Result<FastqWriter> {
    let file = fs::File::create(&path)
        .with_context(|| format!("could not create {}", path.as_ref().display()))?;
    let inner: Box<dyn Write> = if compress {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(io::BufWriter::new(file))
    };
    Ok(bio_fastq::Writer::new(inner))
}

/// Opens a FASTQ reader, decompressing `.gz` input.
pub fn fastq_reader<P: AsRef<Path>>(path: P) -> Result<bio_fastq::Reader<BufReader<Box<dyn io::Read>>>> {
    let file = fs::File::open(&path)
        .with_context(|| format!("could not open {}", path.as_ref().display()))?;
    let is_gz = path.as_ref().extension().map_or(false, |e| e == "gz");
    let inner: Box<dyn io::Read> = if is_gz {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };
    Ok(bio_fastq::Reader::new(inner))
}
