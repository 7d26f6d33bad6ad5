//! Comparison result model: status classification, row-level changes and
//! the derived column impact summary

use crate::dataset::Value;
use crate::hash::DatasetDigest;
use crate::key_inference::KeyCandidate;
use crate::schema::SchemaDiff;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Final classification of one file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
    /// Exact digests are equal
    ChecksumMatch,
    /// Every difference was absorbed by the float tolerance
    ToleranceMatch,
    /// Data compared row by row, nothing differed
    Identical,
    DifferencesFound,
    /// Data not compared
    SchemaMismatch,
    /// No key was found and fuzzy linkage could not pair any rows
    NoSortKey,
    /// The pair could not be compared at all (load failure, limits)
    Error,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::ChecksumMatch => "CHECKSUM_MATCH",
            ComparisonStatus::ToleranceMatch => "TOLERANCE_MATCH",
            ComparisonStatus::Identical => "IDENTICAL",
            ComparisonStatus::DifferencesFound => "DIFFERENCES_FOUND",
            ComparisonStatus::SchemaMismatch => "SCHEMA_MISMATCH",
            ComparisonStatus::NoSortKey => "NO_SORT_KEY",
            ComparisonStatus::Error => "ERROR",
        }
    }

    /// Statuses that let a later run skip an unchanged pair
    pub fn is_passing(&self) -> bool {
        matches!(
            self,
            ComparisonStatus::ChecksumMatch | ComparisonStatus::ToleranceMatch | ComparisonStatus::Identical
        )
    }

    /// Statuses that warrant a written report
    pub fn needs_report(&self) -> bool {
        matches!(
            self,
            ComparisonStatus::DifferencesFound | ComparisonStatus::SchemaMismatch | ComparisonStatus::NoSortKey
        )
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage produced the row-level result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMethod {
    /// Data not compared
    None,
    /// Decided by dataset digests alone
    Digest,
    Keyed,
    Fuzzy,
}

/// How a modified row is identified
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RowKey {
    /// Rendered value(s) of the key columns
    Literal { value: String },
    /// Pairing found by similarity scoring
    Fuzzy { score: f64 },
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Literal { value } => f.write_str(value),
            RowKey::Fuzzy { score } => write!(f, "Fuzzy Match (Score: {:.3})", score),
        }
    }
}

/// Cell change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    pub before: Value,
    pub after: Value,
}

/// A row present on only one side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    /// Position in the dataset the row came from
    pub row_index: usize,
    /// Rendered key, when the keyed path produced this row
    pub key: Option<String>,
    pub data: IndexMap<String, Value>,
}

/// Row modification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowModification {
    pub key: RowKey,
    pub before_index: usize,
    pub after_index: usize,
    /// Columns whose values differ beyond tolerance, in comparable order
    pub changes: IndexMap<String, CellChange>,
}

/// Row-level changes produced by either diff engine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowChanges {
    pub added: Vec<RowRecord>,
    pub deleted: Vec<RowRecord>,
    pub modified: Vec<RowModification>,
    /// Row pairs linked with no real differences
    pub matched: usize,
    /// Cells that differed but stayed within tolerance
    pub tolerance_absorbed: usize,
}

impl RowChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Count of modified rows in which a column changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnImpact {
    pub column: String,
    pub modified_rows: usize,
}

/// Parameters and weights used by fuzzy linkage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzySummary {
    pub threshold: f64,
    pub blocking_column: Option<String>,
    pub candidate_pairs: u64,
    pub weights: IndexMap<String, f64>,
}

/// Outcome of comparing one pair of datasets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    pub status: ComparisonStatus,
    pub method: ComparisonMethod,
    pub schema_diff: SchemaDiff,
    pub comparable_columns: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub key: Option<KeyCandidate>,
    pub digest_before: Option<DatasetDigest>,
    pub digest_after: Option<DatasetDigest>,
    pub changes: RowChanges,
    pub fuzzy: Option<FuzzySummary>,
}

impl DiffResult {
    /// A result carrying only schema information
    pub fn new(
        status: ComparisonStatus,
        schema_diff: SchemaDiff,
        comparable_columns: Vec<String>,
        rows_before: usize,
        rows_after: usize,
    ) -> Self {
        Self {
            status,
            method: ComparisonMethod::None,
            schema_diff,
            comparable_columns,
            rows_before,
            rows_after,
            key: None,
            digest_before: None,
            digest_after: None,
            changes: RowChanges::default(),
            fuzzy: None,
        }
    }

    pub fn has_differences(&self) -> bool {
        !self.changes.is_empty() || self.schema_diff.has_changes()
    }

    pub fn added(&self) -> &[RowRecord] {
        &self.changes.added
    }

    pub fn deleted(&self) -> &[RowRecord] {
        &self.changes.deleted
    }

    pub fn modified(&self) -> &[RowModification] {
        &self.changes.modified
    }

    /// Columns ranked by how many modified rows they changed in, most
    /// impacted first, ties by name
    pub fn column_impact(&self) -> Vec<ColumnImpact> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for modification in &self.changes.modified {
            for column in modification.changes.keys() {
                *counts.entry(column.as_str()).or_insert(0) += 1;
            }
        }

        let mut impact: Vec<ColumnImpact> = counts
            .into_iter()
            .map(|(column, modified_rows)| ColumnImpact {
                column: column.to_string(),
                modified_rows,
            })
            .collect();
        impact.sort_by(|a, b| {
            b.modified_rows
                .cmp(&a.modified_rows)
                .then_with(|| a.column.cmp(&b.column))
        });
        impact
    }

    /// One-line description used in logs and the console summary
    pub fn summary_line(&self) -> String {
        match self.status {
            ComparisonStatus::SchemaMismatch => format!(
                "{}: {} added, {} removed, {} retyped columns",
                self.status,
                self.schema_diff.added.len(),
                self.schema_diff.removed.len(),
                self.schema_diff.type_changed.len()
            ),
            ComparisonStatus::ChecksumMatch | ComparisonStatus::ToleranceMatch => {
                format!("{}: {} rows", self.status, self.rows_before)
            }
            _ => format!(
                "{}: {} added, {} deleted, {} modified",
                self.status,
                self.changes.added.len(),
                self.changes.deleted.len(),
                self.changes.modified.len()
            ),
        }
    }
}
