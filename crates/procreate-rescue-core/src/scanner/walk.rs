use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Binary property list holding a document's metadata. Its presence as a
/// direct child is what makes a directory a Procreate document.
pub const DESCRIPTOR_FILE_NAME: &str = "Document.archive";

pub fn is_document_root(dir: &Path) -> bool {
    fs::metadata(dir.join(DESCRIPTOR_FILE_NAME))
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Lazily walk `root` and yield every document root below it (including
/// `root` itself). The walk never descends into a document, and directories
/// that cannot be read are logged and skipped.
pub fn scan_documents(root: &Path) -> DocumentWalker {
    DocumentWalker {
        inner: WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter(),
    }
}

pub struct DocumentWalker {
    inner: walkdir::IntoIter,
}

impl Iterator for DocumentWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    warn!("Skipping unreadable entry {}: {}", path, err);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if is_document_root(entry.path()) {
                debug!("Document found at {}", entry.path().display());
                self.inner.skip_current_dir();
                return Some(entry.into_path());
            }
        }
    }
}
