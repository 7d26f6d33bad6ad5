//! Command-line interface for pqcompare

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pqcompare")]
#[command(about = "Regression comparison of before/after tabular datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare every paired file under the configured base paths
    Run {
        /// YAML configuration file
        #[arg(long)]
        config: PathBuf,

        /// Re-compare pairs that already passed on an earlier run
        #[arg(long)]
        force: bool,

        /// Skip the digest check and always diff rows
        #[arg(long)]
        no_checksum: bool,

        /// Number of worker threads (must be > 0)
        #[arg(long, value_parser = validate_workers)]
        workers: Option<usize>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Compare two files directly
    Compare {
        /// The "before" file
        before: PathBuf,

        /// The "after" file
        after: PathBuf,

        /// Optional YAML configuration for tolerances and rules. File rules
        /// are matched against the BEFORE path as given.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the float tolerance
        #[arg(long, value_parser = validate_tolerance)]
        tolerance: Option<f64>,

        /// Skip the digest check and always diff rows
        #[arg(long)]
        no_checksum: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Write an HTML report here when differences are found
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
}

/// Validate that the worker count is greater than 0
fn validate_workers(s: &str) -> Result<usize, String> {
    let workers: usize = s
        .parse()
        .map_err(|_| format!("Invalid worker count: '{}'. Must be a positive integer.", s))?;

    if workers == 0 {
        return Err("Worker count must be greater than 0".to_string());
    }

    Ok(workers)
}

/// Validate that a tolerance is a finite, non-negative number
fn validate_tolerance(s: &str) -> Result<f64, String> {
    let tolerance: f64 = s
        .parse()
        .map_err(|_| format!("Invalid tolerance: '{}'", s))?;

    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(format!("Tolerance must be a finite number >= 0, got {}", s));
    }

    Ok(tolerance)
}
