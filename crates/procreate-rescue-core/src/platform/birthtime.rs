use std::fs::{FileTimes, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

#[cfg(target_os = "macos")]
use std::os::macos::fs::FileTimesExt;
#[cfg(target_os = "windows")]
use std::os::windows::fs::FileTimesExt;

pub fn set_created(path: &Path, created: SystemTime) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_created(created))
}
