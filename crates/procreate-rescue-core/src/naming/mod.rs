mod ledger;

pub use ledger::{NameLedger, ResolvedName};

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

pub const BUNDLE_EXTENSION: &str = "procreate";

/// `YY.MM.DD-HH.MM`
const TOKEN_FORMAT: &str = "%y.%m.%d-%H.%M";
const TOKEN_LEN: usize = 14;
const THUMBNAIL_PATH: &str = "QuickLook/Thumbnail.png";
/// Leaves room for the disambiguation suffix and extension within the usual
/// 255-byte file name limit.
const MAX_NAME_BYTES: usize = 200;

/// Creation and modification times captured from a candidate subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTimes {
    pub created: SystemTime,
    pub modified: SystemTime,
}

/// Creation time is the directory's birth time, or its modification time on
/// platforms without one. Modification time comes from the QuickLook
/// thumbnail, which Procreate rewrites on every save, falling back to the
/// directory.
pub fn source_times(dir: &Path) -> io::Result<SourceTimes> {
    let metadata = fs::metadata(dir)?;
    let dir_modified = metadata.modified()?;
    let created = metadata.created().unwrap_or(dir_modified);
    let modified = fs::metadata(dir.join(THUMBNAIL_PATH))
        .and_then(|m| m.modified())
        .unwrap_or(dir_modified);
    Ok(SourceTimes { created, modified })
}

pub fn format_token<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format(TOKEN_FORMAT).to_string()
}

pub fn token_for(time: SystemTime) -> String {
    format_token(&DateTime::<Local>::from(time))
}

/// True when `name` begins with a `YY.MM.DD-HH.MM` token, i.e. it was
/// already stamped by an earlier run.
pub fn has_token_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < TOKEN_LEN {
        return false;
    }
    bytes[..TOKEN_LEN].iter().enumerate().all(|(i, b)| match i {
        2 | 5 | 11 => *b == b'.',
        8 => *b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// Trim surrounding whitespace, replace characters that are illegal in file
/// names on macOS, Linux or Windows with `_`, then trim again.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    truncate_to_bytes(trimmed, MAX_NAME_BYTES).to_string()
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].trim_end()
}

/// Sanitized project name, or `None` when nothing usable is left or the name
/// is one of the configured placeholders.
pub fn usable_project_name(name: Option<&str>, placeholders: &[String]) -> Option<String> {
    let sanitized = sanitize_filename(name?);
    if sanitized.is_empty()
        || placeholders
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(&sanitized))
    {
        return None;
    }
    Some(sanitized)
}

/// `<token>-<name>` when a usable name was recovered, the name alone when it
/// already carries a token, and `<token>` otherwise.
pub fn compose_base_name(token: &str, project_name: Option<&str>, placeholders: &[String]) -> String {
    match usable_project_name(project_name, placeholders) {
        Some(name) if has_token_prefix(&name) => name,
        Some(name) => format!("{}-{}", token, name),
        None => token.to_string(),
    }
}
