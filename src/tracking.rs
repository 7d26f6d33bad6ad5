//! Persistent log of compared file pairs
//!
//! Stored as `comparison_log.json` in the output directory. A pair is only
//! skipped on a later run when its last status was passing and neither file
//! has changed size or modification time since.

use crate::change_detection::ComparisonStatus;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub const TRACKING_FILE_NAME: &str = "comparison_log.json";

/// Size and modification time of a file when it was compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSignature {
    pub size: u64,
    /// Nanoseconds since the Unix epoch; absent when the platform has no mtime
    pub modified: Option<u64>,
}

impl FileSignature {
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| u64::try_from(d.as_nanos()).ok());
        Ok(Self {
            size: metadata.len(),
            modified,
        })
    }
}

/// One recorded comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub file_before: PathBuf,
    pub file_after: PathBuf,
    pub status: ComparisonStatus,
    pub compared_at: DateTime<Utc>,
    pub report_path: Option<PathBuf>,
    pub before_signature: Option<FileSignature>,
    pub after_signature: Option<FileSignature>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackingLog {
    records: Vec<ComparisonRecord>,
}

/// Comparison tracker backed by a JSON file
#[derive(Debug)]
pub struct ComparisonTracker {
    path: PathBuf,
    log: TrackingLog,
}

impl ComparisonTracker {
    /// Open the tracker in `output_dir`, starting empty if no log exists
    pub fn open(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join(TRACKING_FILE_NAME);
        let log = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(log) => log,
                Err(e) => {
                    log::warn!("Ignoring unreadable tracking log {}: {}", path.display(), e);
                    TrackingLog::default()
                }
            }
        } else {
            TrackingLog::default()
        };
        Ok(Self { path, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ComparisonRecord] {
        &self.log.records
    }

    pub fn get(&self, file_before: &Path, file_after: &Path) -> Option<&ComparisonRecord> {
        self.log
            .records
            .iter()
            .find(|r| r.file_before == file_before && r.file_after == file_after)
    }

    /// True when the pair last passed and both files are unchanged since
    pub fn has_been_processed(&self, file_before: &Path, file_after: &Path) -> bool {
        let Some(record) = self.get(file_before, file_after) else {
            return false;
        };
        if !record.status.is_passing() {
            return false;
        }
        let unchanged = |recorded: &Option<FileSignature>, path: &Path| match (recorded, FileSignature::of(path)) {
            (Some(recorded), Ok(current)) => *recorded == current,
            _ => false,
        };
        unchanged(&record.before_signature, file_before) && unchanged(&record.after_signature, file_after)
    }

    /// Insert or replace the record for a pair
    pub fn log_comparison(
        &mut self,
        file_before: &Path,
        file_after: &Path,
        status: ComparisonStatus,
        report_path: Option<&Path>,
    ) {
        let record = ComparisonRecord {
            file_before: file_before.to_path_buf(),
            file_after: file_after.to_path_buf(),
            status,
            compared_at: Utc::now(),
            report_path: report_path.map(Path::to_path_buf),
            before_signature: FileSignature::of(file_before).ok(),
            after_signature: FileSignature::of(file_after).ok(),
        };

        match self
            .log
            .records
            .iter_mut()
            .find(|r| r.file_before == file_before && r.file_after == file_after)
        {
            Some(existing) => *existing = record,
            None => self.log.records.push(record),
        }
    }

    /// Write the log atomically: temp file first, then rename
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_string_pretty(&self.log)?)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
