use super::BUNDLE_EXTENSION;
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The final, unique output name for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// File name without the extension; also the name written into the descriptor.
    pub name: String,
    pub path: PathBuf,
}

/// Output names handed out during one run. Reservation of a name is atomic,
/// so documents processed on different threads never receive the same one.
pub struct NameLedger {
    output_dir: PathBuf,
    max_attempts: usize,
    // Keyed case-insensitively: APFS and NTFS treat `Art` and `art` as the same file.
    reserved: DashMap<String, PathBuf>,
}

impl NameLedger {
    pub fn new(output_dir: &Path, max_attempts: usize) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            max_attempts: max_attempts.max(1),
            reserved: DashMap::new(),
        }
    }

    /// Reserve `base`, or `base-2`, `base-3`, … when it is already taken in
    /// this run or exists in the output directory.
    pub fn reserve(&self, base: &str) -> Result<ResolvedName> {
        for attempt in 1..=self.max_attempts {
            let name = if attempt == 1 {
                base.to_string()
            } else {
                format!("{}-{}", base, attempt)
            };
            let path = self
                .output_dir
                .join(format!("{}.{}", name, BUNDLE_EXTENSION));

            match self.reserved.entry(name.to_lowercase()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    // Checked while the shard lock is held.
                    if fs::symlink_metadata(&path).is_ok() {
                        continue;
                    }
                    slot.insert(path.clone());
                    return Ok(ResolvedName { name, path });
                }
            }
        }

        Err(Error::NameCollisionExhausted {
            base: base.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Give a name back after the document using it failed.
    pub fn release(&self, resolved: &ResolvedName) {
        self.reserved.remove(&resolved.name.to_lowercase());
    }

    pub(crate) fn len(&self) -> usize {
        self.reserved.len()
    }
}
