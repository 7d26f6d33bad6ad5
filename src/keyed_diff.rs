//! Exact row diff via an outer join on a validated key

use crate::change_detection::{CellChange, RowChanges, RowKey, RowModification, RowRecord};
use crate::config::Tolerance;
use crate::dataset::{Dataset, Value};
use crate::hash::HashComputer;
use crate::schema::{CellOutcome, ComparableColumn, Side};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};

/// Keyed diff over a fixed comparable column set
pub struct KeyedDiff<'a> {
    columns: &'a [ComparableColumn],
    key: Vec<&'a ComparableColumn>,
    tolerance: Tolerance,
}

impl<'a> KeyedDiff<'a> {
    pub fn new(columns: &'a [ComparableColumn], key: Vec<&'a ComparableColumn>, tolerance: Tolerance) -> Self {
        Self {
            columns,
            key,
            tolerance,
        }
    }

    /// Join both datasets on the key. Repeated key values are paired in row
    /// order; surplus occurrences are reported as added or deleted.
    pub fn diff(&self, before: &Dataset, after: &Dataset) -> RowChanges {
        let mut after_index: HashMap<Vec<u8>, VecDeque<usize>> = HashMap::new();
        for row in 0..after.row_count() {
            after_index
                .entry(HashComputer::key_bytes(after, row, &self.key, Side::After))
                .or_default()
                .push_back(row);
        }

        let mut changes = RowChanges::default();
        let mut after_matched = vec![false; after.row_count()];
        let mut before_seen: HashMap<Vec<u8>, usize> = HashMap::new();

        for row in 0..before.row_count() {
            let key = HashComputer::key_bytes(before, row, &self.key, Side::Before);
            let occurrence = next_occurrence(&mut before_seen, &key);

            match after_index.get_mut(&key).and_then(|rows| rows.pop_front()) {
                Some(after_row) => {
                    after_matched[after_row] = true;
                    let (cells, absorbed) = self.compare_rows(before, row, after, after_row);
                    changes.tolerance_absorbed += absorbed;
                    if cells.is_empty() {
                        changes.matched += 1;
                    } else {
                        changes.modified.push(RowModification {
                            key: RowKey::Literal {
                                value: self.key_label(before, row, Side::Before, occurrence),
                            },
                            before_index: row,
                            after_index: after_row,
                            changes: cells,
                        });
                    }
                }
                None => changes.deleted.push(RowRecord {
                    row_index: row,
                    key: Some(self.key_label(before, row, Side::Before, occurrence)),
                    data: row_data(before, row, self.columns, Side::Before),
                }),
            }
        }

        let mut after_seen: HashMap<Vec<u8>, usize> = HashMap::new();
        for row in 0..after.row_count() {
            let key = HashComputer::key_bytes(after, row, &self.key, Side::After);
            let occurrence = next_occurrence(&mut after_seen, &key);
            if after_matched[row] {
                continue;
            }
            changes.added.push(RowRecord {
                row_index: row,
                key: Some(self.key_label(after, row, Side::After, occurrence)),
                data: row_data(after, row, self.columns, Side::After),
            });
        }

        log::debug!(
            "Keyed diff: {} added, {} deleted, {} modified, {} matched, {} cells within tolerance",
            changes.added.len(),
            changes.deleted.len(),
            changes.modified.len(),
            changes.matched,
            changes.tolerance_absorbed
        );
        changes
    }

    /// Real differences between two joined rows, plus the number of cells
    /// that differed only within tolerance
    fn compare_rows(
        &self,
        before: &Dataset,
        before_row: usize,
        after: &Dataset,
        after_row: usize,
    ) -> (IndexMap<String, CellChange>, usize) {
        let mut cells = IndexMap::new();
        let mut absorbed = 0;

        for column in self.columns {
            if self.key.iter().any(|k| k.name == column.name) {
                continue;
            }
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

    fn key_label(&self, dataset: &Dataset, row: usize, side: Side, occurrence: usize) -> String {
        let values: Vec<String> = self
            .key
            .iter()
            .map(|c| dataset.value(row, c.index(side)).to_string())
            .collect();
        let label = match values.as_slice() {
            [single] => single.clone(),
            _ => format!("({})", values.join(", ")),
        };
        if occurrence > 0 {
            format!("{}#{}", label, occurrence + 1)
        } else {
            label
        }
    }
}

fn next_occurrence(seen: &mut HashMap<Vec<u8>, usize>, key: &[u8]) -> usize {
    let count = seen.entry(key.to_vec()).or_insert(0);
    let occurrence = *count;
    *count += 1;
    occurrence
}

/// Comparable values of one row, keyed by column name
pub fn row_data(dataset: &Dataset, row: usize, columns: &[ComparableColumn], side: Side) -> IndexMap<String, Value> {
    columns
        .iter()
        .map(|c| (c.name.clone(), dataset.value(row, c.index(side)).clone()))
        .collect()
}
