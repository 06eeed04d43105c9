//! MD5 checksums of delivered files.
//!
//! ## Usage:
//!
//! Verify a delivery against the checksums sent by the sequencing center:
//! ```bash
//! $ hmp2 verify-checksums -c md5sums.txt raw/*.bam
//! ```
//!
//! Write `<stem>.md5` next to each file:
//! ```bash
//! $ hmp2 generate-checksums processed/*.tar
//! ```
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use md5::{Digest, Md5};
use rayon::prelude::*;

use crate::common;
use crate::errors::Error;

pub fn md5sum<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(&path)
        .with_context(|| format!("could not open {}", path.as_ref().display()))?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks every file against the checksum listed for its basename in
/// `checksums_file`. Returns the verified files.
pub fn verify_files<P: AsRef<Path> + Sync, Q: AsRef<Path>>(
    files: &[P],
    checksums_file: Q,
) -> Result<Vec<PathBuf>> {
    let checksums = common::parse_checksums_file(checksums_file)?;
    files
        .par_iter()
        .map(|file| -> Result<PathBuf> {
            let name = common::basename(file);
            let expected = checksums
                .get(&name)
                .ok_or_else(|| Error::ChecksumNotFound { file: name.clone() })?;
            let found = md5sum(file)?;
            if &found != expected {
                return Err(Error::ChecksumMismatch {
                    file: name,
                    expected: expected.clone(),
                    found,
                }
                .into());
            }
            info!("{}: OK", name);
            Ok(file.as_ref().to_owned())
        })
        .collect()
}

/// Writes `<dir>/<stem>.md5` in `md5sum` format for each file.
pub fn generate<P: AsRef<Path> + Sync>(files: &[P]) -> Result<Vec<PathBuf>> {
    files
        .par_iter()
        .map(|file| -> Result<PathBuf> {
            let file = file.as_ref();
            let dir = file.parent().unwrap_or_else(|| Path::new("."));
            let output = common::name_file(dir, &common::sample_name(file, None), None, Some("md5"));
            let checksum = md5sum(file)?;
            fs::write(&output, format!("{}  {}\n", checksum, common::basename(file)))
                .with_context(|| format!("could not write {}", output.display()))?;
            Ok(output)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.txt");
        fs::write(&file, "hello\n").unwrap();

        let outputs = generate(&[&file]).unwrap();
        assert_eq!(outputs, vec![dir.path().join("sample.md5")]);
        assert_eq!(
            fs::read_to_string(&outputs[0]).unwrap(),
            "b1946ac92492d2347c6235b4d2611184  sample.txt\n"
        );
        assert_eq!(verify_files(&[&file], &outputs[0]).unwrap(), vec![file.clone()]);
    }

    #[test]
    fn test_verify_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.txt");
        fs::write(&file, "hello\n").unwrap();
        let checksums = dir.path().join("md5sums.txt");

        fs::write(&checksums, "00000000000000000000000000000000  sample.txt\n").unwrap();
        let err = verify_files(&[&file], &checksums).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ChecksumMismatch { .. })));

        fs::write(&checksums, "b1946ac92492d2347c6235b4d2611184  other.txt\n").unwrap();
        let err = verify_files(&[&file], &checksums).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ChecksumNotFound { .. })));
    }
}
