use super::{restore_error, TimestampSetter};
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

/// `SetFile` expects local time as `MM/DD/YYYY HH:MM:SS`.
const SETFILE_DATE_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Applies timestamps with Apple's `SetFile` tool (Xcode Command Line Tools).
pub struct SetFileCommand {
    program: PathBuf,
}

impl Default for SetFileCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("SetFile"),
        }
    }
}

impl SetFileCommand {
    #[cfg(test)]
    fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, flag: &str, time: SystemTime, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg(flag)
            .arg(format_setfile_date(time))
            .arg(path)
            .output()
            .map_err(|e| restore_error(path, format!("cannot run {}: {}", self.program.display(), e)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(restore_error(
                path,
                format!(
                    "{} {} exited with {}: {}",
                    self.program.display(),
                    flag,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

impl TimestampSetter for SetFileCommand {
    fn set_times(&self, path: &Path, created: SystemTime, modified: SystemTime) -> Result<()> {
        self.run("-d", created, path)?;
        self.run("-m", modified, path)
    }

    fn check_available(&self) -> Result<()> {
        if find_program(&self.program).is_some() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "'{}' was not found. It ships with the Xcode Command Line Tools \
                 (install with `xcode-select --install`).",
                self.program.display()
            )))
        }
    }
}

pub fn format_setfile_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(SETFILE_DATE_FORMAT)
        .to_string()
}

fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
