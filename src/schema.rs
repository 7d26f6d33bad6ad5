//! Schema reconciliation between the "before" and "after" datasets
//!
//! Classifies every non-ignored column name into exactly one of added,
//! removed, type-changed or common, and derives the comparable column set
//! that gates every later stage.

use crate::config::{FileRules, SchemaPolicy, Tolerance};
use crate::dataset::{ColumnDescriptor, LogicalType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column present in both datasets with a different logical type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChange {
    pub column: String,
    pub from: LogicalType,
    pub to: LogicalType,
}

/// Column-level differences between two schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Present only in "after"
    pub added: Vec<ColumnDescriptor>,
    /// Present only in "before"
    pub removed: Vec<ColumnDescriptor>,
    pub type_changed: Vec<TypeChange>,
    /// Same name and logical type
    pub common: Vec<String>,
}

impl SchemaDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.type_changed.is_empty()
    }
}

/// How a comparable column's values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonMode {
    Native(LogicalType),
    /// Type-changed column, compared through canonical string coercion
    Coerced { before: LogicalType, after: LogicalType },
}

/// Which dataset of the pair a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Before,
    After,
}

/// A column that takes part in data comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparableColumn {
    pub name: String,
    pub before_index: usize,
    pub after_index: usize,
    pub mode: ComparisonMode,
}

/// Outcome of comparing one pair of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    Equal,
    /// Numeric values that differ but not beyond the tolerance
    WithinTolerance,
    Different,
}

impl ComparableColumn {
    pub fn is_numeric(&self) -> bool {
        matches!(self.mode, ComparisonMode::Native(t) if t.is_numeric())
    }

    /// Position of this column in the dataset on the given side
    pub fn index(&self, side: Side) -> usize {
        match side {
            Side::Before => self.before_index,
            Side::After => self.after_index,
        }
    }

    pub fn is_coerced(&self) -> bool {
        matches!(self.mode, ComparisonMode::Coerced { .. })
    }

    pub fn logical_type(&self) -> Option<LogicalType> {
        match self.mode {
            ComparisonMode::Native(t) => Some(t),
            ComparisonMode::Coerced { .. } => None,
        }
    }

    /// Compare two cells of this column
    pub fn compare(&self, before: &Value, after: &Value, tolerance: &Tolerance) -> CellOutcome {
        if self.is_coerced() {
            return if before.coerce_to_string() == after.coerce_to_string() {
                CellOutcome::Equal
            } else {
                CellOutcome::Different
            };
        }

        match (before, after) {
            (Value::Null, Value::Null) => CellOutcome::Equal,
            (Value::Null, _) | (_, Value::Null) => CellOutcome::Different,
            (Value::Integer(a), Value::Integer(b)) => {
                if a == b {
                    CellOutcome::Equal
                } else if tolerance.within_integers(*a, *b) {
                    CellOutcome::WithinTolerance
                } else {
                    CellOutcome::Different
                }
            }
            _ if self.is_numeric() => match (before.as_f64(), after.as_f64()) {
                (Some(a), Some(b)) => {
                    if a == b || (a.is_nan() && b.is_nan()) {
                        CellOutcome::Equal
                    } else {
                        numeric_outcome(a, b, tolerance)
                    }
                }
                _ => {
                    if before == after {
                        CellOutcome::Equal
                    } else {
                        CellOutcome::Different
                    }
                }
            },
            _ => {
                if before == after {
                    CellOutcome::Equal
                } else {
                    CellOutcome::Different
                }
            }
        }
    }
}

fn numeric_outcome(a: f64, b: f64, tolerance: &Tolerance) -> CellOutcome {
    if a.is_nan() || b.is_nan() || a.is_infinite() || b.is_infinite() {
        return CellOutcome::Different;
    }
    if tolerance.within(a, b) {
        CellOutcome::WithinTolerance
    } else {
        CellOutcome::Different
    }
}

/// Schema diff plus the comparable columns in "before" declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub diff: SchemaDiff,
    pub comparable: Vec<ComparableColumn>,
}

impl Reconciliation {
    /// Whether data comparison must be skipped under the given policy
    pub fn is_incompatible(&self, policy: SchemaPolicy) -> bool {
        match policy {
            SchemaPolicy::Lenient => self.comparable.is_empty(),
            SchemaPolicy::Strict => self.comparable.is_empty() || self.diff.has_changes(),
        }
    }

    pub fn comparable_names(&self) -> Vec<&str> {
        self.comparable.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Schema reconciler
pub struct SchemaReconciler;

impl SchemaReconciler {
    /// Align two schemas, dropping ignored columns from every category
    pub fn reconcile(
        before: &[ColumnDescriptor],
        after: &[ColumnDescriptor],
        rules: &FileRules,
    ) -> Reconciliation {
        let after_positions: HashMap<&str, usize> = after
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();
        let before_names: HashMap<&str, usize> = before
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();

        let mut diff = SchemaDiff::default();
        let mut comparable = Vec::new();

        for (before_index, col) in before.iter().enumerate() {
            if rules.is_ignored(&col.name) {
                continue;
            }
            match after_positions.get(col.name.as_str()) {
                None => diff.removed.push(col.clone()),
                Some(&after_index) => {
                    let after_col = &after[after_index];
                    let mode = if col.logical_type == after_col.logical_type {
                        diff.common.push(col.name.clone());
                        ComparisonMode::Native(col.logical_type)
                    } else {
                        diff.type_changed.push(TypeChange {
                            column: col.name.clone(),
                            from: col.logical_type,
                            to: after_col.logical_type,
                        });
                        ComparisonMode::Coerced {
                            before: col.logical_type,
                            after: after_col.logical_type,
                        }
                    };
                    comparable.push(ComparableColumn {
                        name: col.name.clone(),
                        before_index,
                        after_index,
                        mode,
                    });
                }
            }
        }

        for col in after {
            if rules.is_ignored(&col.name) || before_names.contains_key(col.name.as_str()) {
                continue;
            }
            diff.added.push(col.clone());
        }

        if diff.has_changes() {
            log::debug!(
                "Schema differences: {} added, {} removed, {} retyped",
                diff.added.len(),
                diff.removed.len(),
                diff.type_changed.len()
            );
        }

        Reconciliation { diff, comparable }
    }
}
