//! Per-pair comparison pipeline
//!
//! schema check → digest check → key inference → keyed or fuzzy diff →
//! classification. The engine holds no state between calls; the same two
//! datasets and rules always produce the same [`DiffResult`].

use crate::change_detection::{ComparisonMethod, ComparisonStatus, DiffResult, RowChanges};
use crate::config::FileRules;
use crate::data::DataLoader;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::fuzzy::FuzzyMatcher;
use crate::hash::HashComputer;
use crate::key_inference::KeyInference;
use crate::keyed_diff::KeyedDiff;
use crate::schema::{SchemaReconciler, Side};
use std::path::Path;

/// Comparison engine
pub struct ComparisonEngine;

impl ComparisonEngine {
    /// Compare two loaded datasets under the rules resolved for their path
    pub fn compare(before: &Dataset, after: &Dataset, rules: &FileRules) -> Result<DiffResult> {
        let reconciliation = SchemaReconciler::reconcile(before.columns(), after.columns(), rules);
        let comparable = &reconciliation.comparable;
        let mut result = DiffResult::new(
            ComparisonStatus::SchemaMismatch,
            reconciliation.diff.clone(),
            reconciliation.comparable_names().iter().map(|s| s.to_string()).collect(),
            before.row_count(),
            after.row_count(),
        );

        if reconciliation.is_incompatible(rules.schema_policy) {
            log::info!("Schema mismatch; data not compared");
            return Ok(result);
        }

        if rules.force_full_diff {
            log::debug!("Digest check skipped");
        } else {
            log::debug!("Stage 1: digest check over {} columns", comparable.len());
            let computer = HashComputer::new(rules.tolerance());
            let digest_before = computer.digest(before, comparable, Side::Before);
            let digest_after = computer.digest(after, comparable, Side::After);

            let exact = digest_before.matches_exactly(&digest_after);
            if !exact && digest_before.matches_within_tolerance(&digest_after) {
                // Bucket equality is a hint only; the row diff decides.
                log::debug!("Digests agree within tolerance buckets; confirming row by row");
            }
            result.digest_before = Some(digest_before);
            result.digest_after = Some(digest_after);

            if exact {
                log::info!("{}: digests agree", ComparisonStatus::ChecksumMatch);
                result.status = ComparisonStatus::ChecksumMatch;
                result.method = ComparisonMethod::Digest;
                return Ok(result);
            }
        }

        if before.row_count() == 0 && after.row_count() == 0 {
            result.status = ComparisonStatus::Identical;
            return Ok(result);
        }

        log::debug!("Stage 2: key inference");
        let inference = KeyInference::new(comparable, rules);
        let key = inference.infer_for_pair(before, after);
        let key_columns = key.as_ref().and_then(|k| inference.resolve(&k.columns));

        match (key, key_columns) {
            (Some(key), Some(key_columns)) => {
                log::info!("Stage 3: keyed diff on [{}]", key.columns.join(", "));
                let changes = KeyedDiff::new(comparable, key_columns, rules.tolerance()).diff(before, after);
                result.status = classify(&changes);
                result.method = ComparisonMethod::Keyed;
                result.key = Some(key);
                result.changes = changes;
            }
            _ => {
                log::info!("Stage 3: no key found, falling back to fuzzy matching");
                let outcome = FuzzyMatcher::new(comparable, rules).link(before, after)?;
                let both_have_rows = before.row_count() > 0 && after.row_count() > 0;
                result.status = if !outcome.usable || (outcome.accepted == 0 && both_have_rows) {
                    ComparisonStatus::NoSortKey
                } else {
                    classify(&outcome.changes)
                };
                result.method = ComparisonMethod::Fuzzy;
                result.changes = outcome.changes;
                result.fuzzy = Some(outcome.summary);
            }
        }

        log::info!("{}", result.summary_line());
        Ok(result)
    }

    /// Load both files and compare them
    pub fn compare_files(before_path: &Path, after_path: &Path, rules: &FileRules) -> Result<DiffResult> {
        let before = DataLoader::load_file(before_path)?;
        let after = DataLoader::load_file(after_path)?;
        let (before, after) = DataLoader::promote_temporal_columns(before, after, rules.datetime_parse_threshold)?;
        Self::compare(&before, &after, rules)
    }
}

/// Convenience wrapper around [`ComparisonEngine::compare`]
pub fn compare(before: &Dataset, after: &Dataset, rules: &FileRules) -> Result<DiffResult> {
    ComparisonEngine::compare(before, after, rules)
}

fn classify(changes: &RowChanges) -> ComparisonStatus {
    if !changes.is_empty() {
        ComparisonStatus::DifferencesFound
    } else if changes.tolerance_absorbed > 0 {
        ComparisonStatus::ToleranceMatch
    } else {
        ComparisonStatus::Identical
    }
}
