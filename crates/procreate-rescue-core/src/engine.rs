use crate::bundle::{self, EntryOverrides};
use crate::config::AppConfig;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::naming::{self, NameLedger, ResolvedName, SourceTimes};
use crate::platform::{self, TimestampSetter};
use crate::progress::ProgressReporter;
use crate::scanner::{self, DESCRIPTOR_FILE_NAME};
use glob::Pattern;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a document got to. `Failed` outcomes record the last stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentStage {
    Discovered,
    NameResolved,
    DescriptorPatched,
    Assembled,
    TimestampRestored,
    Done,
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentStage::Discovered => "discovered",
            DocumentStage::NameResolved => "name resolved",
            DocumentStage::DescriptorPatched => "descriptor patched",
            DocumentStage::Assembled => "assembled",
            DocumentStage::TimestampRestored => "timestamps restored",
            DocumentStage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    Done { output: PathBuf, name: String },
    Failed { stage: DocumentStage, reason: String },
}

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub source: PathBuf,
    pub status: DocumentStatus,
    pub warnings: Vec<String>,
}

impl DocumentOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.status, DocumentStatus::Done { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.status {
            DocumentStatus::Done { output, .. } => Some(output),
            DocumentStatus::Failed { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub input_root: PathBuf,
    pub output_dir: PathBuf,
    /// In discovery order.
    pub documents: Vec<DocumentOutcome>,
    pub scan_duration: Duration,
    pub bundle_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub discovered: usize,
    pub done: usize,
    pub done_with_warnings: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        let done = self.documents.iter().filter(|d| d.is_done()).count();
        let done_with_warnings = self
            .documents
            .iter()
            .filter(|d| d.is_done() && !d.warnings.is_empty())
            .count();
        BatchSummary {
            discovered: self.documents.len(),
            done,
            done_with_warnings,
            failed: self.documents.len() - done,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents.iter().filter(|d| !d.is_done())
    }

    pub fn all_succeeded(&self) -> bool {
        self.documents.iter().all(DocumentOutcome::is_done)
    }
}

pub struct RecoveryEngine {
    config: AppConfig,
    timestamps: Box<dyn TimestampSetter>,
}

impl RecoveryEngine {
    pub fn new(config: AppConfig) -> Self {
        let timestamps = platform::timestamp_setter(config.timestamp_backend);
        Self { config, timestamps }
    }

    pub fn with_timestamp_setter(mut self, timestamps: Box<dyn TimestampSetter>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the recovery pipeline over `input_root`:
    /// 1. Walk the tree for directories holding a `Document.archive`
    /// 2. Per document: resolve a unique name, patch the descriptor in memory,
    ///    zip the directory into `<name>.procreate`, restore its timestamps
    ///
    /// Only an unusable input root or output directory is an error here; every
    /// per-document problem is recorded in the returned `BatchResult`.
    pub fn run(&self, input_root: &Path, reporter: &dyn ProgressReporter) -> Result<BatchResult> {
        check_input_root(input_root)?;
        let output_dir = self.config.resolve_output_dir(input_root);
        fs::create_dir_all(&output_dir)?;
        info!("Writing bundles to {}", output_dir.display());

        if let Err(e) = self.timestamps.check_available() {
            warn!("Timestamps will not be restored: {}", e);
        }
        let exclude = bundle::compile_patterns(&self.config.exclude_patterns);

        // Phase 1: Scan
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let mut candidates: Vec<PathBuf> = Vec::new();
        for path in scanner::scan_documents(input_root) {
            reporter.on_document_found(candidates.len() + 1, &path);
            candidates.push(path);
        }
        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(candidates.len(), scan_duration.as_secs_f64());
        info!(
            "Found {} documents in {:.2}s",
            candidates.len(),
            scan_duration.as_secs_f64()
        );

        // Phase 2: Bundle
        let ledger = NameLedger::new(&output_dir, self.config.max_name_attempts);
        let total = candidates.len();
        let processed = AtomicUsize::new(0);
        reporter.on_bundle_start(total);
        let bundle_start = Instant::now();

        let process = |source: &PathBuf| {
            let outcome = DocumentRun::new(source, &ledger, &exclude, self.timestamps.as_ref())
                .execute(&self.config);
            let count = processed.fetch_add(1, Ordering::SeqCst) + 1;
            reporter.on_bundle_progress(count, total);
            outcome
        };

        let documents: Vec<DocumentOutcome> = if self.config.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|e| Error::Other(format!("Cannot start worker pool: {}", e)))?;
            debug!("Processing with {} workers", self.config.jobs);
            pool.install(|| candidates.par_iter().map(process).collect())
        } else {
            candidates.iter().map(process).collect()
        };
        let bundle_duration = bundle_start.elapsed();
        debug!("{} output names reserved", ledger.len());

        let result = BatchResult {
            input_root: input_root.to_path_buf(),
            output_dir,
            documents,
            scan_duration,
            bundle_duration,
        };
        let summary = result.summary();
        reporter.on_bundle_complete(summary.done, summary.failed, bundle_duration.as_secs_f64());
        Ok(result)
    }
}

fn check_input_root(input_root: &Path) -> Result<()> {
    let metadata = fs::metadata(input_root).map_err(|e| Error::InputRoot {
        path: input_root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(Error::InputRoot {
            path: input_root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    fs::read_dir(input_root).map_err(|e| Error::InputRoot {
        path: input_root.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// One document moving through the pipeline.
struct DocumentRun<'a> {
    source: &'a Path,
    ledger: &'a NameLedger,
    exclude: &'a [Pattern],
    timestamps: &'a dyn TimestampSetter,
    stage: DocumentStage,
    warnings: Vec<String>,
}

impl<'a> DocumentRun<'a> {
    fn new(
        source: &'a Path,
        ledger: &'a NameLedger,
        exclude: &'a [Pattern],
        timestamps: &'a dyn TimestampSetter,
    ) -> Self {
        Self {
            source,
            ledger,
            exclude,
            timestamps,
            stage: DocumentStage::Discovered,
            warnings: Vec::new(),
        }
    }

    fn execute(mut self, config: &AppConfig) -> DocumentOutcome {
        let status = match self.resolve_and_build(config) {
            Ok(resolved) => {
                self.stage = DocumentStage::Done;
                info!("{} → {}", self.source.display(), resolved.path.display());
                DocumentStatus::Done {
                    output: resolved.path,
                    name: resolved.name,
                }
            }
            Err(e) => {
                error!("{} failed ({}): {}", self.source.display(), self.stage, e);
                DocumentStatus::Failed {
                    stage: self.stage,
                    reason: e.to_string(),
                }
            }
        };
        DocumentOutcome {
            source: self.source.to_path_buf(),
            status,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, err: Error) {
        warn!("{}: {}", self.source.display(), err);
        self.warnings.push(err.to_string());
    }

    fn resolve_and_build(&mut self, config: &AppConfig) -> Result<ResolvedName> {
        let times = naming::source_times(self.source)?;
        let raw = fs::read(self.source.join(DESCRIPTOR_FILE_NAME))?;
        let descriptor = match Descriptor::from_bytes(&raw) {
            Ok(descriptor) => {
                debug!(
                    "{}: {} descriptor",
                    self.source.display(),
                    if descriptor.is_keyed_archive() { "keyed archive" } else { "plain" }
                );
                Some(descriptor)
            }
            Err(e) => {
                self.warn(e);
                None
            }
        };

        let recovered = descriptor.as_ref().and_then(Descriptor::name);
        let token = naming::token_for(times.created);
        let base =
            naming::compose_base_name(&token, recovered.as_deref(), &config.placeholder_names);
        let resolved = self.ledger.reserve(&base)?;
        self.stage = DocumentStage::NameResolved;
        debug!(
            "{}: recovered name {:?}, output name '{}'",
            self.source.display(),
            recovered,
            resolved.name
        );

        match self.build(&resolved, descriptor, raw, times) {
            Ok(()) => Ok(resolved),
            Err(e) => {
                self.ledger.release(&resolved);
                Err(e)
            }
        }
    }

    fn build(
        &mut self,
        resolved: &ResolvedName,
        descriptor: Option<Descriptor>,
        raw: Vec<u8>,
        times: SourceTimes,
    ) -> Result<()> {
        // An unreadable descriptor is packed as found.
        let descriptor_bytes = match descriptor {
            Some(mut descriptor) => {
                descriptor.set_name(&resolved.name)?;
                descriptor
                    .to_bytes()
                    .map_err(|e| Error::DescriptorWrite(e.to_string()))?
            }
            None => raw,
        };
        self.stage = DocumentStage::DescriptorPatched;

        let mut overrides = EntryOverrides::new();
        overrides.insert(DESCRIPTOR_FILE_NAME.to_string(), descriptor_bytes);
        bundle::assemble(self.source, &resolved.path, &overrides, self.exclude)?;
        self.stage = DocumentStage::Assembled;

        if let Err(e) = self
            .timestamps
            .set_times(&resolved.path, times.created, times.modified)
        {
            self.warn(e);
        }
        self.stage = DocumentStage::TimestampRestored;
        Ok(())
    }
}
