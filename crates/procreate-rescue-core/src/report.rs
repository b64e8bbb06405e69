use crate::engine::{BatchResult, DocumentStage, DocumentStatus};
use crate::error::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    source: String,
    status: &'static str,
    stage: DocumentStage,
    output: String,
    name: &'a str,
    warnings: String,
    error: &'a str,
}

impl BatchResult {
    /// Write one CSV row per document, in discovery order.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for document in &self.documents {
            let row = match &document.status {
                DocumentStatus::Done { output, name } => ReportRow {
                    source: document.source.display().to_string(),
                    status: if document.warnings.is_empty() {
                        "done"
                    } else {
                        "done_with_warnings"
                    },
                    stage: DocumentStage::Done,
                    output: output.display().to_string(),
                    name,
                    warnings: document.warnings.join("; "),
                    error: "",
                },
                DocumentStatus::Failed { stage, reason } => ReportRow {
                    source: document.source.display().to_string(),
                    status: "failed",
                    stage: *stage,
                    output: String::new(),
                    name: "",
                    warnings: document.warnings.join("; "),
                    error: reason,
                },
            };
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
