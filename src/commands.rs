//! Command implementations for the pqcompare CLI

use crate::cli::Commands;
use crate::compare::ComparisonEngine;
use crate::config::CompareConfig;
use crate::error::{PqcompareError, Result};
use crate::output::{HtmlReport, JsonFormatter, PrettyPrinter};
use crate::runner::{self, RunOptions};
use std::path::Path;

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            force,
            no_checksum,
            workers,
            no_progress,
        } => run_command(&config, force, no_checksum, workers, no_progress),
        Commands::Compare {
            before,
            after,
            config,
            tolerance,
            no_checksum,
            json,
            report_dir,
        } => compare_command(
            &before,
            &after,
            config.as_deref(),
            tolerance,
            no_checksum,
            json,
            report_dir.as_deref(),
        ),
    }
}

fn run_command(
    config_path: &Path,
    force: bool,
    no_checksum: bool,
    workers: Option<usize>,
    no_progress: bool,
) -> Result<()> {
    let config = CompareConfig::load(config_path)?;
    let options = RunOptions {
        force,
        skip_checksum: no_checksum,
        workers,
        show_progress: !no_progress,
        print_results: true,
    };
    runner::run(&config, &options)?;
    Ok(())
}

fn compare_command(
    before: &Path,
    after: &Path,
    config_path: Option<&Path>,
    tolerance: Option<f64>,
    no_checksum: bool,
    json: bool,
    report_dir: Option<&Path>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => CompareConfig::load(path)?,
        None => CompareConfig::default(),
    };
    if let Some(tolerance) = tolerance {
        config.float_tolerance = tolerance;
    }
    config.validate()?;

    if before.file_name().is_none() {
        return Err(PqcompareError::invalid_input(format!("Not a file: {}", before.display())));
    }
    // Patterns match from the right, so directory-qualified rules apply too
    let mut rules = config.rules_for(before)?;
    if no_checksum {
        rules.force_full_diff = true;
    }

    let result = ComparisonEngine::compare_files(before, after, &rules)?;

    if json {
        println!("{}", JsonFormatter::format_result(&result)?);
    } else {
        PrettyPrinter::print_result(&before.display().to_string(), &result);
    }

    if let Some(dir) = report_dir {
        if result.status.needs_report() {
            let path = HtmlReport::write(&result, before, after, dir)?;
            if !json {
                println!("Report: {}", path.display());
            }
        }
    }

    Ok(())
}
