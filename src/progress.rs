//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Progress reporter for a batch of file-pair comparisons
#[derive(Debug)]
pub struct ProgressReporter {
    pub discovery_pb: Option<ProgressBar>,
    pub pairs_pb: Option<ProgressBar>,
    show_progress: bool,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create progress reporter for a run, starting with the discovery spinner
    pub fn new_for_run() -> Self {
        Self {
            discovery_pb: Some(create_spinner("Discovering data files...")),
            pairs_pb: None,
            show_progress: true,
            start_time: Instant::now(),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            discovery_pb: None,
            pairs_pb: None,
            show_progress: false,
            start_time: Instant::now(),
        }
    }

    /// Finish discovery and open the per-pair bar
    pub fn finish_discovery(&mut self, message: &str, total_pairs: u64) {
        if let Some(pb) = self.discovery_pb.take() {
            pb.finish_with_message(message.to_string());
        }
        if self.show_progress && self.pairs_pb.is_none() {
            self.pairs_pb = Some(create_progress_bar(total_pairs, "Comparing"));
        }
    }

    /// A handle that worker threads can advance; `None` when progress is off
    pub fn pairs_handle(&self) -> Option<ProgressBar> {
        self.pairs_pb.clone()
    }

    /// Finish pair processing
    pub fn finish_pairs(&mut self, message: &str) {
        if let Some(pb) = self.pairs_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.discovery_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.pairs_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}
