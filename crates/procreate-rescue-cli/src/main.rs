mod commands;
mod logging;
mod progress;

use std::process;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::Cli;
use dotenv::dotenv;
use procreate_rescue_core::{AppConfig, BatchResult, DocumentStatus, RecoveryEngine, SilentReporter};
use progress::CliReporter;
use tracing::{error, info};

const EXIT_FAILURES: i32 = 1;
const EXIT_FATAL: i32 = 2;

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();
    let args = Cli::parse();

    let code = match run(args) {
        Ok(result) => {
            print_summary(&result);
            if result.all_succeeded() {
                0
            } else {
                EXIT_FAILURES
            }
        }
        Err(err) => {
            error!("Error: {:#}", err);
            EXIT_FATAL
        }
    };

    drop(guard);
    process::exit(code);
}

fn run(args: Cli) -> anyhow::Result<BatchResult> {
    let mut config = procreate_rescue_core::config::load_configuration()
        .context("Error loading configuration")?;
    apply_overrides(&mut config, &args);
    info!("Input folder: {}", args.input.display());

    let engine = RecoveryEngine::new(config);
    let result = if args.no_progress {
        engine.run(&args.input, &SilentReporter)?
    } else {
        engine.run(&args.input, &CliReporter::new())?
    };

    if let Some(report) = &args.report {
        result
            .write_csv(report)
            .with_context(|| format!("Error writing report {}", report.display()))?;
        info!("Report written to {}", report.display());
    }

    Ok(result)
}

fn apply_overrides(config: &mut AppConfig, args: &Cli) {
    if let Some(output) = &args.output {
        config.output_dir = Some(output.to_string_lossy().into_owned());
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(backend) = args.timestamps {
        config.timestamp_backend = backend;
    }
}

fn print_summary(result: &BatchResult) {
    let summary = result.summary();

    println!();
    info!(
        "{} documents found, {} rebuilt ({} with warnings), {} failed",
        format!("{}", summary.discovered).cyan(),
        format!("{}", summary.done).green(),
        format!("{}", summary.done_with_warnings).yellow(),
        format!("{}", summary.failed).red(),
    );
    info!("Output folder: {}", result.output_dir.display());

    for document in result.documents.iter().filter(|d| d.is_done() && !d.warnings.is_empty()) {
        for warning in &document.warnings {
            eprintln!(
                "  {} {}: {}",
                "warning".yellow(),
                document.source.display(),
                warning
            );
        }
    }

    for document in result.failures() {
        if let DocumentStatus::Failed { stage, reason } = &document.status {
            eprintln!(
                "  {} {} (after {}): {}",
                "failed".red(),
                document.source.display(),
                stage,
                reason
            );
        }
    }
}
