use std::path::Path;

/// Trait for reporting recovery progress.
///
/// The CLI implements it with indicatif. All methods have default no-op
/// implementations, and may be called from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_document_found(&self, _found: usize, _path: &Path) {}
    fn on_scan_complete(&self, _total: usize, _duration_secs: f64) {}
    fn on_bundle_start(&self, _total: usize) {}
    fn on_bundle_progress(&self, _processed: usize, _total: usize) {}
    fn on_bundle_complete(&self, _done: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
