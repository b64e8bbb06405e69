use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Property list error: {0}")]
    Plist(#[from] plist::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input root {} is not usable: {reason}", path.display())]
    InputRoot { path: PathBuf, reason: String },

    #[error("Descriptor is unreadable: {0}")]
    DescriptorUnreadable(String),

    #[error("Descriptor cannot be rewritten: {0}")]
    DescriptorWrite(String),

    #[error("Failed to assemble bundle from {}: {reason}", source_dir.display())]
    Assembly { source_dir: PathBuf, reason: String },

    #[error("Failed to restore timestamps on {}: {reason}", path.display())]
    TimestampRestore { path: PathBuf, reason: String },

    #[error("No free output name for '{base}' after {attempts} attempts")]
    NameCollisionExhausted { base: String, attempts: usize },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
