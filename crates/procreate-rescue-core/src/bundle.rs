//! Packing a document directory into a `.procreate` bundle.
//!
//! A bundle is a plain zip of the document directory's contents, with paths
//! relative to the document root. Layer payloads are already compressed by
//! Procreate and are copied through as opaque bytes.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use glob::Pattern;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Component, Path};
use std::time::SystemTime;
use tracing::{debug, error, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssembleStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Entries whose content is supplied from memory instead of disk, keyed by
/// `/`-separated path relative to the document root.
pub type EntryOverrides = HashMap<String, Vec<u8>>;

pub fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Zip `source_dir` into `destination`.
///
/// The archive is written to a temp file next to `destination` and only moved
/// into place once complete; on any error nothing is left behind. An existing
/// file at `destination` is never replaced.
pub fn assemble(
    source_dir: &Path,
    destination: &Path,
    overrides: &EntryOverrides,
    exclude: &[Pattern],
) -> Result<AssembleStats> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".procreate-rescue-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| assembly_error(source_dir, e))?;

    let stats = write_archive(tmp.as_file_mut(), source_dir, overrides, exclude)
        .map_err(|e| match e {
            Error::Assembly { .. } => e,
            other => assembly_error(source_dir, other),
        })?;

    tmp.as_file()
        .sync_all()
        .map_err(|e| assembly_error(source_dir, e))?;
    tmp.persist_noclobber(destination)
        .map_err(|e| assembly_error(source_dir, e.error))?;

    debug!(
        "Wrote {} ({} files, {} directories, {} bytes)",
        destination.display(),
        stats.files,
        stats.directories,
        stats.bytes
    );
    Ok(stats)
}

fn write_archive(
    file: &mut File,
    source_dir: &Path,
    overrides: &EntryOverrides,
    exclude: &[Pattern],
) -> Result<AssembleStats> {
    let mut zip = ZipWriter::new(file);
    let base_options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut stats = AssembleStats::default();

    let mut walker = WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry?;
        let relative = entry_name(entry.path(), source_dir)?;

        if is_excluded(&relative, exclude) {
            debug!("Excluding {}", relative);
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let metadata = entry.metadata()?;
        let options = base_options.last_modified_time(zip_time(metadata.modified().ok()));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", relative), options)?;
            stats.directories += 1;
        } else if entry.file_type().is_file() {
            let options = options.large_file(metadata.len() >= LARGE_FILE_THRESHOLD);
            zip.start_file(relative.as_str(), options)?;
            match overrides.get(&relative) {
                Some(bytes) => {
                    zip.write_all(bytes)?;
                    stats.bytes += bytes.len() as u64;
                }
                None => {
                    let mut source = File::open(entry.path())?;
                    stats.bytes += io::copy(&mut source, &mut zip)?;
                }
            }
            stats.files += 1;
        } else {
            warn!("Skipping non-regular file {}", entry.path().display());
        }
    }

    zip.finish()?;
    Ok(stats)
}

/// Relative path inside the archive, always `/`-separated.
fn entry_name(path: &Path, base: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|e| Error::Other(format!("{}: {}", path.display(), e)))?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn is_excluded(relative: &str, exclude: &[Pattern]) -> bool {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    exclude
        .iter()
        .any(|pattern| pattern.matches(relative) || pattern.matches(file_name))
}

fn zip_time(modified: Option<SystemTime>) -> zip::DateTime {
    modified
        .and_then(|time| {
            let local = DateTime::<Local>::from(time);
            zip::DateTime::from_date_and_time(
                u16::try_from(local.year()).ok()?,
                local.month() as u8,
                local.day() as u8,
                local.hour() as u8,
                local.minute() as u8,
                local.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

fn assembly_error(source_dir: &Path, err: impl Into<Error>) -> Error {
    Error::Assembly {
        source_dir: source_dir.to_path_buf(),
        reason: err.into().to_string(),
    }
}
