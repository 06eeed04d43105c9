//! File naming helpers shared by the metadata, conversion and staging tools.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Sample identifier encoded in a filename: the basename up to the first `.`.
///
/// `/seq/MSM5LLGE.fastq.gz` yields `MSM5LLGE`. Applying the function to its
/// own output returns the same identifier.
pub fn sample_id_from_fname<P: AsRef<Path>>(path: P) -> String {
    let basename = basename(path);
    match basename.find('.') {
        Some(0) | None => basename,
        Some(i) => basename[..i].to_owned(),
    }
}

/// Basename with its last extension removed, optionally also stripping a
/// trailing `strip` fragment (e.g. a pair identifier or `.bam`).
pub fn sample_name<P: AsRef<Path>>(path: P, strip: Option<&str>) -> String {
    let basename = basename(&path);
    if let Some(strip) = strip {
        if let Some(i) = basename.rfind(strip) {
            if strip.starts_with('.') {
                return basename[..i].to_owned();
            }
            let mut name = basename.clone();
            name.replace_range(i..i + strip.len(), "");
            return strip_extension(&name);
        }
    }
    strip_extension(&basename)
}

pub fn basename<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn strip_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(i) if i > 0 => name[..i].to_owned(),
        _ => name.to_owned(),
    }
}

/// Builds `<dir>/<name>[_<tag>][.<extension>]`.
pub fn name_file<P: AsRef<Path>>(
    dir: P,
    name: &str,
    tag: Option<&str>,
    extension: Option<&str>,
) -> PathBuf {
    let mut file_name = name.to_owned();
    if let Some(tag) = tag {
        file_name.push('_');
        file_name.push_str(tag);
    }
    if let Some(extension) = extension {
        file_name.push('.');
        file_name.push_str(extension.trim_start_matches('.'));
    }
    dir.as_ref().join(file_name)
}

/// Like [`name_file`] but creates `<dir>/<subfolder>` first.
pub fn name_file_in_subfolder<P: AsRef<Path>>(
    dir: P,
    subfolder: &str,
    name: &str,
    tag: Option<&str>,
    extension: Option<&str>,
) -> Result<PathBuf> {
    let dir = dir.as_ref().join(subfolder);
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create directory {}", dir.display()))?;
    Ok(name_file(dir, name, tag, extension))
}

/// Identifier of the second mate for a given first-mate pair identifier
/// (`_R1` becomes `_R2`).
pub fn mate_identifier(pair_identifier: &str) -> String {
    pair_identifier.replace('1', "2")
}

/// Splits paired-end files into first and second mates. Files carrying
/// neither identifier are dropped.
pub fn paired_files<P: AsRef<Path>>(
    files: &[P],
    pair_identifier: &str,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mate = mate_identifier(pair_identifier);
    let mut first = Vec::new();
    let mut second = Vec::new();
    for file in files {
        let name = basename(file);
        if name.contains(pair_identifier) {
            first.push(file.as_ref().to_owned());
        } else if name.contains(&mate) {
            second.push(file.as_ref().to_owned());
        }
    }
    first.sort();
    second.sort();
    (first, second)
}

/// Reads an `md5sum` style file into a map of file basename to checksum.
pub fn parse_checksums_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("could not read checksums file {}", path.as_ref().display()))?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let checksum = fields.next()?;
            let file = fields.next()?.trim_start_matches('*');
            Some((basename(file), checksum.to_owned()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_id_from_fname_is_idempotent() {
        for path in &[
            "/seq/MSM5LLGE.fastq.gz",
            "HSM6XRQY_R1.fastq",
            "plain",
            "dir/.hidden",
            "a.b.c.d",
        ] {
            let once = sample_id_from_fname(path);
            assert_eq!(sample_id_from_fname(&once), once);
        }
        assert_eq!(sample_id_from_fname("/seq/MSM5LLGE.fastq.gz"), "MSM5LLGE");
    }

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name("/a/S1_R1.fastq", Some("_R1")), "S1");
        assert_eq!(sample_name("/a/S1.bam", Some(".bam")), "S1");
        assert_eq!(sample_name("/a/S1.tsv", None), "S1");
    }

    #[test]
    fn test_paired_files() {
        let files = vec!["a_R1.fastq", "a_R2.fastq", "b_R1.fastq", "c.fastq"];
        let (first, second) = paired_files(&files, "_R1");
        assert_eq!(first, vec![PathBuf::from("a_R1.fastq"), PathBuf::from("b_R1.fastq")]);
        assert_eq!(second, vec![PathBuf::from("a_R2.fastq")]);
    }

    #[test]
    fn test_name_file() {
        assert_eq!(
            name_file("/out", "S1", Some("R1"), Some("fastq")),
            PathBuf::from("/out/S1_R1.fastq")
        );
        assert_eq!(name_file("/out", "S1", None, None), PathBuf::from("/out/S1"));
    }
}
