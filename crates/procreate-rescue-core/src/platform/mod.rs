#[cfg(any(target_os = "macos", target_os = "windows"))]
mod birthtime;
mod setfile;

pub use setfile::SetFileCommand;

use crate::config::TimestampBackend;
use crate::error::{Error, Result};
use filetime::FileTime;
use std::path::Path;
use std::time::SystemTime;

/// Sets a finished bundle's creation and modification times.
pub trait TimestampSetter: Send + Sync {
    fn set_times(&self, path: &Path, created: SystemTime, modified: SystemTime) -> Result<()>;

    /// Report up front when the backend cannot work on this machine.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }
}

pub fn timestamp_setter(backend: TimestampBackend) -> Box<dyn TimestampSetter> {
    match backend {
        TimestampBackend::Native => Box::new(NativeTimestamps),
        TimestampBackend::SetFile => Box::new(SetFileCommand::default()),
    }
}

/// Modification and access time through `filetime`; creation time where the
/// OS lets a process set it (macOS, Windows). Elsewhere the modification
/// time is applied and the missing creation time is reported as an error.
pub struct NativeTimestamps;

impl TimestampSetter for NativeTimestamps {
    fn set_times(&self, path: &Path, created: SystemTime, modified: SystemTime) -> Result<()> {
        let mtime = FileTime::from_system_time(modified);
        filetime::set_file_times(path, mtime, mtime).map_err(|e| restore_error(path, e))?;
        set_created(path, created)
    }
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn set_created(path: &Path, created: SystemTime) -> Result<()> {
    birthtime::set_created(path, created).map_err(|e| restore_error(path, e))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn set_created(path: &Path, _created: SystemTime) -> Result<()> {
    Err(restore_error(path, "creation time cannot be set on this platform"))
}

pub(crate) fn restore_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::TimestampRestore {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
