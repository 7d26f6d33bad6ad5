//! Property tests for the digest, key inference and keyed diff

use crate::common::sample_data::{product_table, products};
use crate::common::{float, int, table, text};
use pqcompare::hash::HashComputer;
use pqcompare::key_inference::{uniqueness, KeyInference};
use pqcompare::schema::{SchemaReconciler, Side};
use pqcompare::{compare, ComparisonStatus, Dataset, FileRules, LogicalType, Value};
use proptest::prelude::*;

fn row_strategy() -> impl Strategy<Value = Vec<Value>> {
    (any::<i64>(), "[a-z]{0,6}", -1.0e6f64..1.0e6, any::<bool>()).prop_map(|(i, s, f, null)| {
        vec![
            int(i),
            if null { Value::Null } else { text(&s) },
            float(f),
        ]
    })
}

fn mixed_table(rows: Vec<Vec<Value>>) -> Dataset {
    table(
        &[
            ("id", LogicalType::Integer),
            ("label", LogicalType::String),
            ("amount", LogicalType::Float),
        ],
        rows,
    )
}

fn categorical_table(rows: Vec<(i64, i64, i64)>) -> Dataset {
    table(
        &[
            ("a", LogicalType::Integer),
            ("b", LogicalType::Integer),
            ("c", LogicalType::Integer),
        ],
        rows.into_iter().map(|(a, b, c)| vec![int(a), int(b), int(c)]).collect(),
    )
}

proptest! {
    #[test]
    fn digest_ignores_row_order(
        (rows, shuffled) in proptest::collection::vec(row_strategy(), 0..40)
            .prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
    ) {
        let before = mixed_table(rows);
        let after = mixed_table(shuffled);
        let rules = FileRules::default();
        let reconciliation = SchemaReconciler::reconcile(before.columns(), after.columns(), &rules);
        let computer = HashComputer::new(rules.tolerance());

        prop_assert_eq!(
            computer.digest(&before, &reconciliation.comparable, Side::Before),
            computer.digest(&after, &reconciliation.comparable, Side::After)
        );
    }

    #[test]
    fn digest_detects_a_changed_row(
        rows in proptest::collection::vec(row_strategy(), 1..30),
        index in any::<prop::sample::Index>()
    ) {
        let mut changed = rows.clone();
        let row = index.index(changed.len());
        changed[row][0] = match &changed[row][0] {
            Value::Integer(i) => int(i.wrapping_add(1)),
            other => other.clone(),
        };

        let before = mixed_table(rows);
        let after = mixed_table(changed);
        let rules = FileRules::default();
        let reconciliation = SchemaReconciler::reconcile(before.columns(), after.columns(), &rules);
        let computer = HashComputer::new(rules.tolerance());
        let digest_before = computer.digest(&before, &reconciliation.comparable, Side::Before);
        let digest_after = computer.digest(&after, &reconciliation.comparable, Side::After);

        prop_assert_ne!(digest_before.exact, digest_after.exact);
        prop_assert_ne!(digest_before.tolerant, digest_after.tolerant);
    }

    #[test]
    fn inferred_key_meets_threshold_on_both_sides(
        before_rows in proptest::collection::vec((0i64..4, 0i64..4, 0i64..6), 1..30),
        after_rows in proptest::collection::vec((0i64..4, 0i64..4, 0i64..6), 1..30),
        threshold in 0.5f64..=1.0
    ) {
        let before = categorical_table(before_rows);
        let after = categorical_table(after_rows);
        let mut rules = FileRules::default();
        rules.key_uniqueness_threshold = threshold;

        let reconciliation = SchemaReconciler::reconcile(before.columns(), after.columns(), &rules);
        let inference = KeyInference::new(&reconciliation.comparable, &rules);
        if let Some(key) = inference.infer_for_pair(&before, &after) {
            let columns = inference.resolve(&key.columns).unwrap();
            prop_assert!(!columns.is_empty());
            prop_assert!(columns.len() <= rules.max_key_columns);
            prop_assert!(uniqueness(&before, &columns, Side::Before) >= threshold);
            prop_assert!(uniqueness(&after, &columns, Side::After) >= threshold);
            prop_assert!(key.null_safe);
        }
    }

    #[test]
    fn tolerance_decides_modified(delta in 0.0f64..1.0, force_full_diff in any::<bool>()) {
        prop_assume!((delta - 0.5).abs() > 1e-6);

        let before = product_table(products(5));
        let mut changed = products(5);
        changed[2][2] = float(2.0 * 0.5 + 0.25 + delta);

        let mut rules = FileRules::default();
        rules.float_tolerance = 0.5;
        rules.force_full_diff = force_full_diff;
        let result = compare(&before, &product_table(changed), &rules).unwrap();

        prop_assert_eq!(result.modified().len(), usize::from(delta > 0.5));
        prop_assert!(result.added().is_empty());
        prop_assert!(result.deleted().is_empty());
    }

    #[test]
    fn large_magnitude_float_changes_are_never_absorbed(
        base in 1.0e12f64..1.0e17,
        ulps in 1u64..64,
        force_full_diff in any::<bool>()
    ) {
        let changed = f64::from_bits(base.to_bits() + ulps);
        prop_assume!(changed - base > 1e-6);

        let before = product_table(vec![
            vec![int(1), text("a"), float(base)],
            vec![int(2), text("b"), float(1.0)],
        ]);
        let after = product_table(vec![
            vec![int(1), text("a"), float(changed)],
            vec![int(2), text("b"), float(1.0)],
        ]);

        let mut rules = FileRules::default();
        rules.force_full_diff = force_full_diff;
        let result = compare(&before, &after, &rules).unwrap();

        prop_assert_eq!(result.status, ComparisonStatus::DifferencesFound);
        prop_assert_eq!(result.modified().len(), 1);
    }

    #[test]
    fn large_integer_changes_are_never_absorbed(
        base in (1i64 << 53)..(i64::MAX - 1_000),
        delta in 1i64..1_000
    ) {
        let columns = [("id", LogicalType::Integer), ("event_ns", LogicalType::Integer)];
        let before = table(&columns, vec![vec![int(1), int(base)], vec![int(2), int(7)]]);
        let after = table(&columns, vec![vec![int(1), int(base + delta)], vec![int(2), int(7)]]);

        let result = compare(&before, &after, &FileRules::default()).unwrap();
        prop_assert_eq!(result.status, ComparisonStatus::DifferencesFound);
        prop_assert_eq!(result.modified().len(), 1);
        prop_assert_eq!(result.changes.tolerance_absorbed, 0);
    }
}
