//! Staging of processed files into the public data tree.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 stage-files --symlink -t /public/MGX/2017-08-14 out/*.tsv
//! $ hmp2 make-web-visible /public/MGX/2017-08-14/*.tsv
//! $ hmp2 tar-files --compress -o taxonomic_profiles.tar.gz out/*_taxonomic_profile.tsv
//! ```
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use derive_new::new;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};

use crate::common;
use crate::errors::Error;

pub const WEB_VISIBLE_MARKER: &str = "complete.html";

#[derive(new, Debug, Clone)]
pub struct Stager {
    target_dir: PathBuf,
    /// Source root whose directory structure is recreated below the target.
    preserve_from: Option<PathBuf>,
    symlink: bool,
}

impl Stager {
    fn target_for(&self, file: &Path) -> PathBuf {
        if let Some(root) = &self.preserve_from {
            match file.strip_prefix(root) {
                Ok(relative) => return self.target_dir.join(relative),
                Err(_) => warn!(
                    "{} is not below {}, staging it flat.",
                    file.display(),
                    root.display()
                ),
            }
        }
        self.target_dir.join(common::basename(file))
    }

    /// Copies or links each file into the target directory, replacing
    /// anything already there. Returns the staged paths.
    pub fn stage_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<Vec<PathBuf>> {
        if !self.target_dir.is_dir() {
            return Err(Error::MissingTargetDir {
                dir: self.target_dir.display().to_string(),
            }
            .into());
        }
        let mut staged = Vec::new();
        for file in files {
            let file = file.as_ref();
            let target = self.target_for(file);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if target.symlink_metadata().is_ok() {
                if is_same_file(file, &target) {
                    warn!("{} is already in place, skipping it.", file.display());
                    staged.push(target);
                    continue;
                }
                fs::remove_file(&target)
                    .with_context(|| format!("could not replace {}", target.display()))?;
            }
            if self.symlink {
                let source = fs::canonicalize(file)
                    .with_context(|| format!("could not resolve {}", file.display()))?;
                std::os::unix::fs::symlink(&source, &target)?;
            } else {
                fs::copy(file, &target).with_context(|| {
                    format!("could not copy {} to {}", file.display(), target.display())
                })?;
            }
            info!("Staged {} -> {}", file.display(), target.display());
            staged.push(target);
        }
        Ok(staged)
    }
}

/// Whether `target` is `source` itself rather than a link to it or a copy.
fn is_same_file(source: &Path, target: &Path) -> bool {
    let is_link = target
        .symlink_metadata()
        .map_or(false, |m| m.file_type().is_symlink());
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(source), Ok(target)) => !is_link && source == target,
        _ => false,
    }
}

/// Touches `complete.html` in every directory holding one of `files`, which
/// makes the directory show up on the IBDMDB website.
pub fn make_web_visible<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>> {
    let dirs: BTreeSet<PathBuf> = files
        .iter()
        .map(|f| f.as_ref().parent().unwrap_or_else(|| Path::new(".")).to_owned())
        .collect();
    let mut markers = Vec::new();
    for dir in dirs {
        let marker = dir.join(WEB_VISIBLE_MARKER);
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&marker)
            .with_context(|| format!("could not create {}", marker.display()))?;
        markers.push(marker);
    }
    Ok(markers)
}

/// Packs `files` into a tarball without their directory structure.
/// Symlinks are followed.
pub fn tar_files<P: AsRef<Path>, Q: AsRef<Path>>(files: &[P], output: Q, compress: bool) -> Result<PathBuf> {
    let out = File::create(&output)
        .with_context(|| format!("could not create {}", output.as_ref().display()))?;
    let inner: Box<dyn Write> = if compress {
        Box::new(GzEncoder::new(out, Compression::default()))
    } else {
        Box::new(out)
    };
    let mut builder = tar::Builder::new(inner);
    for file in files {
        builder
            .append_path_with_name(file, common::basename(file))
            .with_context(|| format!("could not add {} to tarball", file.as_ref().display()))?;
    }
    builder.into_inner()?.flush()?;
    info!("Wrote {} files to {}", files.len(), output.as_ref().display());
    Ok(output.as_ref().to_owned())
}
