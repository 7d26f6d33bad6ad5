//! Identity key discovery for datasets without declared keys
//!
//! Columns are ranked by how unique their values are. The best single
//! column is tried first, then extended greedily by marginal uniqueness
//! gain until the acceptance threshold or the column ceiling is reached.

use crate::config::FileRules;
use crate::dataset::{Dataset, LogicalType};
use crate::hash::HashComputer;
use crate::schema::{ComparableColumn, ComparisonMode, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A column set hypothesised to identify rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCandidate {
    pub columns: Vec<String>,
    /// Distinct key tuples divided by row count
    pub uniqueness: f64,
    /// No nulls present in any key column
    pub null_safe: bool,
}

/// Key inference over a fixed comparable column set
pub struct KeyInference<'a> {
    columns: &'a [ComparableColumn],
    threshold: f64,
    max_columns: usize,
}

impl<'a> KeyInference<'a> {
    pub fn new(columns: &'a [ComparableColumn], rules: &FileRules) -> Self {
        Self {
            columns,
            threshold: rules.key_uniqueness_threshold,
            max_columns: rules.max_key_columns,
        }
    }

    /// Find a key accepted on both datasets. Inference runs on "before"
    /// and is validated on "after"; failing that, the roles are swapped.
    pub fn infer_for_pair(&self, before: &Dataset, after: &Dataset) -> Option<KeyCandidate> {
        let attempts = [(before, Side::Before, after, Side::After), (after, Side::After, before, Side::Before)];

        for (source, source_side, other, other_side) in attempts {
            let Some(candidate) = self.infer(source, source_side) else {
                continue;
            };
            match self.validate(&candidate, other, other_side) {
                Some(validated) => {
                    log::debug!(
                        "Key [{}] accepted (uniqueness {:.4} / {:.4})",
                        candidate.columns.join(", "),
                        candidate.uniqueness,
                        validated.uniqueness
                    );
                    return Some(KeyCandidate {
                        uniqueness: candidate.uniqueness.min(validated.uniqueness),
                        ..candidate
                    });
                }
                None => log::debug!(
                    "Key [{}] found on {:?} rejected on {:?}",
                    candidate.columns.join(", "),
                    source_side,
                    other_side
                ),
            }
        }
        None
    }

    /// Propose a key for one dataset
    pub fn infer(&self, dataset: &Dataset, side: Side) -> Option<KeyCandidate> {
        if dataset.row_count() == 0 {
            return None;
        }

        let mut ranked: Vec<(&ComparableColumn, f64)> = self
            .columns
            .iter()
            .filter(|c| is_key_eligible(c) && !has_nulls(dataset, c, side))
            .map(|c| (c, uniqueness(dataset, &[c], side)))
            .collect();
        // Stable sort keeps declaration order among equal ratios
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best, best_ratio) = *ranked.first()?;
        let mut chosen = vec![best];
        let mut ratio = best_ratio;

        while ratio < self.threshold && chosen.len() < self.max_columns {
            let mut next: Option<(&ComparableColumn, f64)> = None;
            for (column, _) in &ranked {
                if chosen.iter().any(|c| c.name == column.name) {
                    continue;
                }
                let mut trial = chosen.clone();
                trial.push(*column);
                let trial_ratio = uniqueness(dataset, &trial, side);
                if next.map_or(true, |(_, r)| trial_ratio > r) {
                    next = Some((*column, trial_ratio));
                }
            }

            match next {
                Some((column, trial_ratio)) if trial_ratio > ratio => {
                    chosen.push(column);
                    ratio = trial_ratio;
                }
                _ => break,
            }
        }

        if ratio >= self.threshold {
            Some(KeyCandidate {
                columns: chosen.iter().map(|c| c.name.clone()).collect(),
                uniqueness: ratio,
                null_safe: true,
            })
        } else {
            log::debug!(
                "No key on {:?}: best combination reaches {:.4} < {:.4}",
                side,
                ratio,
                self.threshold
            );
            None
        }
    }

    /// Re-check a candidate against the other dataset. Uniqueness cannot be
    /// assessed on an empty dataset, so the candidate is rejected there.
    pub fn validate(&self, candidate: &KeyCandidate, dataset: &Dataset, side: Side) -> Option<KeyCandidate> {
        let columns = self.resolve(&candidate.columns)?;
        if dataset.row_count() == 0 {
            log::debug!("{:?} is empty; key cannot be validated", side);
            return None;
        }

        let null_safe = !columns.iter().any(|c| has_nulls(dataset, c, side));
        let ratio = uniqueness(dataset, &columns, side);
        if null_safe && ratio >= self.threshold {
            Some(KeyCandidate {
                columns: candidate.columns.clone(),
                uniqueness: ratio,
                null_safe,
            })
        } else {
            None
        }
    }

    /// Look up comparable columns by name, in key order
    pub fn resolve(&self, names: &[String]) -> Option<Vec<&'a ComparableColumn>> {
        names
            .iter()
            .map(|name| self.columns.iter().find(|c| &c.name == name))
            .collect()
    }
}

/// Float values are matched by tolerance, so they never join exactly
fn is_key_eligible(column: &ComparableColumn) -> bool {
    match column.mode {
        ComparisonMode::Native(t) => t != LogicalType::Float,
        ComparisonMode::Coerced { before, after } => {
            before != LogicalType::Float && after != LogicalType::Float
        }
    }
}

fn has_nulls(dataset: &Dataset, column: &ComparableColumn, side: Side) -> bool {
    dataset
        .column_values(column.index(side))
        .iter()
        .any(|v| v.is_null())
}

/// Distinct key tuples divided by row count
pub fn uniqueness(dataset: &Dataset, columns: &[&ComparableColumn], side: Side) -> f64 {
    let rows = dataset.row_count();
    if rows == 0 {
        return 0.0;
    }
    let distinct: HashSet<Vec<u8>> = (0..rows)
        .map(|row| HashComputer::key_bytes(dataset, row, columns, side))
        .collect();
    distinct.len() as f64 / rows as f64
}
