//! Similarity-based row linkage for datasets without a usable key
//!
//! Every candidate (before, after) row pair is scored as a weighted sum of
//! per-column agreement, then pairs are accepted greedily from the highest
//! score down. Scoring is quadratic in row count within each block, so the
//! number of candidate pairs is checked against `fuzzy_max_pairs` before any
//! scoring starts.

use crate::change_detection::{CellChange, FuzzySummary, RowChanges, RowKey, RowModification, RowRecord};
use crate::config::{FileRules, FuzzyBlocking, Tolerance};
use crate::dataset::{Dataset, LogicalType, Value};
use crate::error::{PqcompareError, Result};
use crate::hash::HashComputer;
use crate::keyed_diff::row_data;
use crate::schema::{CellOutcome, ComparableColumn, ComparisonMode, Side};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Auto blocking prefers columns whose distinct ratio falls in this range
const BLOCKING_RATIO_RANGE: (f64, f64) = (0.1, 0.95);
/// Fallback upper bound when nothing lands in the preferred range
const BLOCKING_FALLBACK_MAX: f64 = 0.99;

/// Result of fuzzy linkage
#[derive(Debug, Clone)]
pub struct FuzzyOutcome {
    pub changes: RowChanges,
    pub summary: FuzzySummary,
    /// Pairs accepted at or above the threshold
    pub accepted: usize,
    /// False when no column carried any weight
    pub usable: bool,
}

/// One scored candidate pair
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    before: usize,
    after: usize,
}

/// Column participating in scoring
struct WeightedColumn<'a> {
    column: &'a ComparableColumn,
    weight: f64,
    /// Observed numeric range over both datasets
    range: Option<f64>,
}

/// Fuzzy linkage over a fixed comparable column set
pub struct FuzzyMatcher<'a> {
    columns: &'a [ComparableColumn],
    rules: &'a FileRules,
    tolerance: Tolerance,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(columns: &'a [ComparableColumn], rules: &'a FileRules) -> Self {
        Self {
            columns,
            rules,
            tolerance: rules.tolerance(),
        }
    }

    /// Pair rows of the two datasets and report what changed
    pub fn link(&self, before: &Dataset, after: &Dataset) -> Result<FuzzyOutcome> {
        let weighted = self.weighted_columns(before, after);
        let total_weight: f64 = weighted.iter().map(|w| w.weight).sum();
        let weights: IndexMap<String, f64> = weighted
            .iter()
            .map(|w| (w.column.name.clone(), w.weight / total_weight))
            .collect();

        let blocking = self.blocking_column(before);
        let blocks = build_blocks(before, after, blocking);
        let candidate_pairs: u64 = blocks
            .iter()
            .map(|(b, a)| b.len() as u64 * a.len() as u64)
            .sum();

        let mut summary = FuzzySummary {
            threshold: self.rules.fuzzy_match_threshold,
            blocking_column: blocking.map(|c| c.name.clone()),
            candidate_pairs,
            weights,
        };

        if weighted.is_empty() {
            log::warn!("No column carries weight for fuzzy matching");
            summary.candidate_pairs = 0;
            return Ok(FuzzyOutcome {
                changes: unpaired(before, after, self.columns, &[], &[]),
                summary,
                accepted: 0,
                usable: false,
            });
        }

        if candidate_pairs > self.rules.fuzzy_max_pairs {
            return Err(PqcompareError::FuzzyLimit {
                pairs: candidate_pairs,
                limit: self.rules.fuzzy_max_pairs,
            });
        }

        match &summary.blocking_column {
            Some(name) => log::info!("Using '{}' as a blocking column for fuzzy matching", name),
            None => log::info!("No blocking column; scoring {} candidate pairs", candidate_pairs),
        }

        let mut candidates = Vec::new();
        for (before_rows, after_rows) in &blocks {
            for &b in before_rows {
                for &a in after_rows {
                    let score = self.score(&weighted, total_weight, before, b, after, a);
                    if score >= self.rules.fuzzy_match_threshold {
                        candidates.push(Candidate {
                            score,
                            before: b,
                            after: a,
                        });
                    }
                }
            }
        }

        candidates.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then(x.before.cmp(&y.before))
                .then(x.after.cmp(&y.after))
        });

        let mut before_taken = vec![false; before.row_count()];
        let mut after_taken = vec![false; after.row_count()];
        let mut accepted = Vec::new();
        for candidate in candidates {
            if before_taken[candidate.before] || after_taken[candidate.after] {
                continue;
            }
            before_taken[candidate.before] = true;
            after_taken[candidate.after] = true;
            accepted.push(candidate);
        }
        accepted.sort_by(|x, y| x.before.cmp(&y.before));

        let mut changes = unpaired(before, after, self.columns, &before_taken, &after_taken);
        for pair in &accepted {
            let (cells, absorbed) = self.cell_changes(before, pair.before, after, pair.after);
            changes.tolerance_absorbed += absorbed;
            if cells.is_empty() {
                changes.matched += 1;
            } else {
                changes.modified.push(RowModification {
                    key: RowKey::Fuzzy { score: pair.score },
                    before_index: pair.before,
                    after_index: pair.after,
                    changes: cells,
                });
            }
        }

        log::debug!(
            "Fuzzy linkage accepted {} of {} rows ({} modified)",
            accepted.len(),
            before.row_count(),
            changes.modified.len()
        );

        Ok(FuzzyOutcome {
            changes,
            summary,
            accepted: accepted.len(),
            usable: true,
        })
    }

    /// Weight each column by its distinct-value ratio over both datasets
    fn weighted_columns(&self, before: &Dataset, after: &Dataset) -> Vec<WeightedColumn<'a>> {
        let total_rows = before.row_count() + after.row_count();
        if total_rows == 0 {
            return Vec::new();
        }

        self.columns
            .iter()
            .filter_map(|column| {
                let mut distinct = HashSet::new();
                collect_distinct(&mut distinct, before, column, Side::Before);
                collect_distinct(&mut distinct, after, column, Side::After);
                let weight = distinct.len() as f64 / total_rows as f64;
                if weight <= 0.0 {
                    return None;
                }
                let range = if column.is_numeric() {
                    numeric_range(before, after, column)
                } else {
                    None
                };
                Some(WeightedColumn { column, weight, range })
            })
            .collect()
    }

    fn blocking_column(&self, before: &Dataset) -> Option<&'a ComparableColumn> {
        match &self.rules.fuzzy_blocking {
            FuzzyBlocking::Off => None,
            FuzzyBlocking::Column(name) => {
                let found = self.columns.iter().find(|c| &c.name == name);
                if found.is_none() {
                    log::warn!("Blocking column '{}' is not comparable; fuzzy matching unblocked", name);
                }
                found
            }
            FuzzyBlocking::Auto => auto_blocking_column(self.columns, before),
        }
    }

    fn score(
        &self,
        weighted: &[WeightedColumn<'_>],
        total_weight: f64,
        before: &Dataset,
        before_row: usize,
        after: &Dataset,
        after_row: usize,
    ) -> f64 {
        let mut sum = 0.0;
        for w in weighted {
            let b = before.value(before_row, w.column.before_index);
            let a = after.value(after_row, w.column.after_index);
            sum += w.weight * self.similarity(w, b, a);
        }
        sum / total_weight
    }

    /// Per-column agreement in [0, 1]
    fn similarity(&self, weighted: &WeightedColumn<'_>, before: &Value, after: &Value) -> f64 {
        if weighted.column.compare(before, after, &self.tolerance) != CellOutcome::Different {
            return 1.0;
        }
        if !weighted.column.is_numeric() {
            return 0.0;
        }

        let (Some(diff), Some(range)) = (numeric_difference(before, after), weighted.range) else {
            return 0.0;
        };
        if !diff.is_finite() || range <= 0.0 {
            return 0.0;
        }
        (1.0 - (diff / range) / self.rules.fuzzy_max_numeric_difference).clamp(0.0, 1.0)
    }

    fn cell_changes(
        &self,
        before: &Dataset,
        before_row: usize,
        after: &Dataset,
        after_row: usize,
    ) -> (IndexMap<String, CellChange>, usize) {
        let mut cells = IndexMap::new();
        let mut absorbed = 0;
        for column in self.columns {
            let b = before.value(before_row, column.before_index);
            let a = after.value(after_row, column.after_index);
            match column.compare(b, a, &self.tolerance) {
                CellOutcome::Equal => {}
                CellOutcome::WithinTolerance => absorbed += 1,
                CellOutcome::Different => {
                    cells.insert(
                        column.name.clone(),
                        CellChange {
                            before: b.clone(),
                            after: a.clone(),
                        },
                    );
                }
            }
        }
        (cells, absorbed)
    }
}

fn collect_distinct(distinct: &mut HashSet<Vec<u8>>, dataset: &Dataset, column: &ComparableColumn, side: Side) {
    for row in 0..dataset.row_count() {
        distinct.insert(HashComputer::key_bytes(dataset, row, &[column], side));
    }
}

/// Absolute difference, exact for integer pairs
fn numeric_difference(before: &Value, after: &Value) -> Option<f64> {
    match (before, after) {
        (Value::Integer(b), Value::Integer(a)) => Some(a.abs_diff(*b) as f64),
        _ => Some((after.as_f64()? - before.as_f64()?).abs()),
    }
}

fn numeric_range(before: &Dataset, after: &Dataset, column: &ComparableColumn) -> Option<f64> {
    if column.logical_type() == Some(LogicalType::Integer) {
        return integer_range(before, after, column);
    }

    let values = before
        .column_values(column.before_index)
        .iter()
        .chain(after.column_values(column.after_index))
        .filter_map(|v| v.as_f64())
        .filter(|v| v.is_finite());

    let mut bounds: Option<(f64, f64)> = None;
    for v in values {
        bounds = Some(match bounds {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        });
    }
    bounds.map(|(lo, hi)| hi - lo)
}

fn integer_range(before: &Dataset, after: &Dataset, column: &ComparableColumn) -> Option<f64> {
    let mut bounds: Option<(i64, i64)> = None;
    let values = before
        .column_values(column.before_index)
        .iter()
        .chain(after.column_values(column.after_index));
    for value in values {
        if let Value::Integer(v) = value {
            bounds = Some(match bounds {
                None => (*v, *v),
                Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
            });
        }
    }
    bounds.map(|(lo, hi)| hi.abs_diff(lo) as f64)
}

/// Pick a mid-cardinality string column of "before" to block on
fn auto_blocking_column<'a>(columns: &'a [ComparableColumn], before: &Dataset) -> Option<&'a ComparableColumn> {
    let rows = before.row_count();
    if rows == 0 {
        return None;
    }

    let ratios: Vec<(&ComparableColumn, f64)> = columns
        .iter()
        .filter(|c| c.mode == ComparisonMode::Native(LogicalType::String))
        .map(|c| {
            let mut distinct = HashSet::new();
            collect_distinct(&mut distinct, before, c, Side::Before);
            (c, distinct.len() as f64 / rows as f64)
        })
        .collect();

    let best = |accept: &dyn Fn(f64) -> bool| {
        ratios
            .iter()
            .filter(|(_, r)| accept(*r))
            .fold(None::<(&'a ComparableColumn, f64)>, |best, &(c, r)| match best {
                Some((_, br)) if br.partial_cmp(&r) != Some(Ordering::Less) => best,
                _ => Some((c, r)),
            })
            .map(|(c, _)| c)
    };

    let (low, high) = BLOCKING_RATIO_RANGE;
    best(&|r: f64| r > low && r < high).or_else(|| best(&|r: f64| r < BLOCKING_FALLBACK_MAX))
}

/// Group rows by exact blocking value, in "before" order. Without a blocking
/// column there is a single block holding every row.
fn build_blocks(
    before: &Dataset,
    after: &Dataset,
    blocking: Option<&ComparableColumn>,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    let Some(column) = blocking else {
        return vec![((0..before.row_count()).collect(), (0..after.row_count()).collect())];
    };

    let mut blocks: IndexMap<Vec<u8>, (Vec<usize>, Vec<usize>)> = IndexMap::new();
    for row in 0..before.row_count() {
        let value = HashComputer::key_bytes(before, row, &[column], Side::Before);
        blocks.entry(value).or_default().0.push(row);
    }
    for row in 0..after.row_count() {
        let value = HashComputer::key_bytes(after, row, &[column], Side::After);
        if let Some(block) = blocks.get_mut(&value) {
            block.1.push(row);
        }
    }
    blocks.into_values().collect()
}

/// Rows not taken by any accepted pair, as deleted and added records
fn unpaired(
    before: &Dataset,
    after: &Dataset,
    columns: &[ComparableColumn],
    before_taken: &[bool],
    after_taken: &[bool],
) -> RowChanges {
    let deleted = (0..before.row_count())
        .filter(|&row| !before_taken.get(row).copied().unwrap_or(false))
        .map(|row| RowRecord {
            row_index: row,
            key: None,
            data: row_data(before, row, columns, Side::Before),
        })
        .collect();
    let added = (0..after.row_count())
        .filter(|&row| !after_taken.get(row).copied().unwrap_or(false))
        .map(|row| RowRecord {
            row_index: row,
            key: None,
            data: row_data(after, row, columns, Side::After),
        })
        .collect();

    RowChanges {
        added,
        deleted,
        ..RowChanges::default()
    }
}
