use clap::Parser;
use procreate_rescue_core::TimestampBackend;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "procreate-rescue")]
#[command(
    about = "Rebuild .procreate files from documents extracted out of an iOS backup",
    long_about = None
)]
pub struct Cli {
    /// Extracted Procreate `Application Support` directory (or any folder containing documents)
    pub input: PathBuf,

    /// Where to write the rebuilt .procreate files [default: "Procreate Recovered" next to INPUT]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of documents to process in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// How to restore file dates: native or setfile
    #[arg(long)]
    pub timestamps: Option<TimestampBackend>,

    /// Write a CSV report with one row per document
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
