pub mod bundle;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod naming;
pub mod platform;
pub mod progress;
pub mod report;
pub mod scanner;

pub use config::{AppConfig, TimestampBackend};
pub use engine::{
    BatchResult, BatchSummary, DocumentOutcome, DocumentStage, DocumentStatus, RecoveryEngine,
};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
