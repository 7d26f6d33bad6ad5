//! Directory runs: discover pairs, compare them in parallel, then report
//! and track the outcomes from a single coordinator

use crate::change_detection::{ComparisonStatus, DiffResult};
use crate::compare::ComparisonEngine;
use crate::config::{CompareConfig, FileRules};
use crate::discovery::{find_unmatched_files, pair_files, FilePair, UnmatchedFiles};
use crate::error::{PqcompareError, Result};
use crate::output::{HtmlReport, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::tracking::ComparisonTracker;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::PathBuf;

/// Options for a directory run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Re-compare pairs that already passed
    pub force: bool,
    /// Skip the digest stage and always diff rows
    pub skip_checksum: bool,
    /// Worker threads; `None` uses rayon's default
    pub workers: Option<usize>,
    pub show_progress: bool,
    /// Print a console tree per compared pair
    pub print_results: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            skip_checksum: false,
            workers: None,
            show_progress: true,
            print_results: true,
        }
    }
}

/// Result of comparing one file pair
#[derive(Debug)]
pub struct PairOutcome {
    pub pair: FilePair,
    pub status: ComparisonStatus,
    pub result: Option<DiffResult>,
    pub error: Option<String>,
    pub report_path: Option<PathBuf>,
}

/// Totals for a completed run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PairOutcome>,
    /// Relative paths skipped because they already passed
    pub skipped: Vec<PathBuf>,
    pub unmatched: UnmatchedFiles,
}

impl RunSummary {
    pub fn compared(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, status: ComparisonStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_passing()).count()
    }

    pub fn failed(&self) -> usize {
        self.compared() - self.passed()
    }

    pub fn reports(&self) -> Vec<&PathBuf> {
        self.outcomes.iter().filter_map(|o| o.report_path.as_ref()).collect()
    }
}

/// Compare every paired file under the configured base paths
pub fn run(config: &CompareConfig, options: &RunOptions) -> Result<RunSummary> {
    config.validate()?;
    let (before_root, after_root) = config.base_paths()?;
    let output_dir = config
        .output_directory
        .clone()
        .ok_or_else(|| PqcompareError::config("output_directory is required"))?;

    let mut progress = if options.show_progress {
        ProgressReporter::new_for_run()
    } else {
        ProgressReporter::new_minimal()
    };

    let pairs = pair_files(&before_root, &after_root, &config.file_extensions)?;
    let mut tracker = ComparisonTracker::open(&output_dir)?;

    let mut summary = RunSummary::default();
    let mut jobs: Vec<(FilePair, FileRules)> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if !options.force && tracker.has_been_processed(&pair.before, &pair.after) {
            log::debug!("Skipping {}: already passed", pair.relative_path.display());
            summary.skipped.push(pair.relative_path);
            continue;
        }
        let mut rules = config.rules_for(&pair.relative_path)?;
        if options.skip_checksum {
            rules.force_full_diff = true;
        }
        jobs.push((pair, rules));
    }

    progress.finish_discovery(
        &format!("Found {} pairs, {} already passed", jobs.len(), summary.skipped.len()),
        jobs.len() as u64,
    );
    log::info!(
        "Comparing {} file pairs ({} skipped)",
        jobs.len(),
        summary.skipped.len()
    );

    let pool = {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = options.workers {
            builder = builder.num_threads(workers);
        }
        builder
            .build()
            .map_err(|e| PqcompareError::Generic(anyhow::anyhow!("Cannot start worker pool: {}", e)))?
    };

    let handle = progress.pairs_handle();
    let outcomes: Vec<PairOutcome> = pool.install(|| {
        jobs.into_par_iter()
            .map(|(pair, rules)| compare_pair(pair, &rules, handle.as_ref()))
            .collect()
    });
    progress.finish_pairs("Comparisons complete");

    for mut outcome in outcomes {
        if let Some(result) = &outcome.result {
            if result.status.needs_report() {
                match HtmlReport::write(result, &outcome.pair.before, &outcome.pair.after, &output_dir) {
                    Ok(path) => outcome.report_path = Some(path),
                    Err(e) => log::warn!(
                        "Could not write report for {}: {}",
                        outcome.pair.relative_path.display(),
                        e
                    ),
                }
            }
        }

        tracker.log_comparison(
            &outcome.pair.before,
            &outcome.pair.after,
            outcome.status,
            outcome.report_path.as_deref(),
        );
        if options.print_results {
            print_outcome(&outcome);
        }
        summary.outcomes.push(outcome);
    }
    tracker.save()?;

    summary.unmatched = find_unmatched_files(&before_root, &after_root, &config.file_extensions)?;
    if options.print_results {
        PrettyPrinter::print_run_summary(&summary);
    }
    log::info!(
        "Run finished in {:.1}s: {} passed, {} failed",
        progress.elapsed().as_secs_f64(),
        summary.passed(),
        summary.failed()
    );
    Ok(summary)
}

/// Compare one pair; every failure is captured as an `ERROR` outcome
fn compare_pair(pair: FilePair, rules: &FileRules, progress: Option<&ProgressBar>) -> PairOutcome {
    log::debug!("Comparing {}", pair.relative_path.display());
    let outcome = match ComparisonEngine::compare_files(&pair.before, &pair.after, rules) {
        Ok(result) => PairOutcome {
            status: result.status,
            result: Some(result),
            error: None,
            report_path: None,
            pair,
        },
        Err(e) => {
            log::warn!("{}: {}", pair.relative_path.display(), e);
            PairOutcome {
                status: ComparisonStatus::Error,
                result: None,
                error: Some(e.to_string()),
                report_path: None,
                pair,
            }
        }
    };
    if let Some(pb) = progress {
        pb.inc(1);
    }
    outcome
}

fn print_outcome(outcome: &PairOutcome) {
    let label = outcome.pair.relative_path.display().to_string();
    match (&outcome.result, &outcome.error) {
        (Some(result), _) => {
            PrettyPrinter::print_result(&label, result);
            if let Some(path) = &outcome.report_path {
                println!("   Report: {}", path.display());
            }
        }
        (None, error) => {
            println!("❌ {}", label);
            println!("└─ Error: {}", error.as_deref().unwrap_or("unknown error"));
        }
    }
    println!();
}
