//! Directory runs over paired before/after trees

use crate::common::TestFixture;
use pqcompare::runner::{run, RunOptions};
use pqcompare::tracking::{ComparisonTracker, TRACKING_FILE_NAME};
use pqcompare::ComparisonStatus;
use std::fs;
use std::path::PathBuf;

fn quiet() -> RunOptions {
    RunOptions {
        workers: Some(2),
        show_progress: false,
        print_results: false,
        ..RunOptions::default()
    }
}

fn populate(fixture: &TestFixture) {
    let before = fixture.before_dir();
    let after = fixture.after_dir();

    fixture
        .create_parquet(&before, "sales/2024/q1.parquet", &[(1, Some("a"), 10.0), (2, Some("b"), 20.0)])
        .unwrap();
    fixture
        .create_parquet(&after, "sales/2024/q1.parquet", &[(2, Some("b"), 20.0), (1, Some("a"), 10.0)])
        .unwrap();

    fixture
        .create_parquet(&before, "ledger/balances.parquet", &[(1, Some("x"), 100.0), (2, Some("y"), 200.0)])
        .unwrap();
    fixture
        .create_parquet(&after, "ledger/balances.parquet", &[(1, Some("x"), 100.004), (2, Some("y"), 200.0)])
        .unwrap();

    fixture
        .create_parquet(&before, "crm/contacts.parquet", &[(1, Some("ann"), 1.0), (2, Some("bob"), 2.0)])
        .unwrap();
    fixture
        .create_parquet(&after, "crm/contacts.parquet", &[(1, Some("ann"), 1.0), (2, Some("rob"), 2.0)])
        .unwrap();

    fixture
        .create_parquet(&before, "retired.parquet", &[(1, Some("old"), 1.0)])
        .unwrap();
    fixture
        .create_parquet(&after, "fresh.parquet", &[(1, Some("new"), 1.0)])
        .unwrap();
}

#[test]
fn test_run_pairs_classifies_and_reports() {
    let fixture = TestFixture::new().unwrap();
    populate(&fixture);

    let mut config = fixture.config(&["parquet"]);
    config.file_specific_rules = tolerance_rule("ledger/*.parquet", 0.01);
    let summary = run(&config, &quiet()).unwrap();

    assert_eq!(summary.compared(), 3);
    let status_of = |relative: &str| {
        summary
            .outcomes
            .iter()
            .find(|o| o.pair.relative_path == PathBuf::from(relative))
            .map(|o| o.status)
    };
    assert_eq!(status_of("sales/2024/q1.parquet"), Some(ComparisonStatus::ChecksumMatch));
    assert_eq!(status_of("ledger/balances.parquet"), Some(ComparisonStatus::ToleranceMatch));
    assert_eq!(status_of("crm/contacts.parquet"), Some(ComparisonStatus::DifferencesFound));

    assert_eq!(summary.unmatched.only_in_before, vec![PathBuf::from("retired.parquet")]);
    assert_eq!(summary.unmatched.only_in_after, vec![PathBuf::from("fresh.parquet")]);

    let reports = summary.reports();
    assert_eq!(reports.len(), 1);
    let html = fs::read_to_string(reports[0]).unwrap();
    assert!(html.contains("rob"));
    assert!(html.contains("Column Impact Summary"));
    assert!(fixture.output_dir().join(TRACKING_FILE_NAME).exists());
}

#[test]
fn test_tracking_skips_passed_pairs_until_files_change() {
    let fixture = TestFixture::new().unwrap();
    populate(&fixture);
    let config = fixture.config(&["parquet"]);

    let first = run(&config, &quiet()).unwrap();
    assert_eq!(first.skipped.len(), 0);

    let tracker = ComparisonTracker::open(&fixture.output_dir()).unwrap();
    assert_eq!(tracker.records().len(), 3);

    let second = run(&config, &quiet()).unwrap();
    assert_eq!(second.skipped, vec![PathBuf::from("sales/2024/q1.parquet")]);

    fixture
        .create_parquet(
            &fixture.after_dir(),
            "sales/2024/q1.parquet",
            &[(1, Some("a"), 10.0), (2, Some("b"), 21.0), (3, Some("c"), 30.0)],
        )
        .unwrap();
    let third = run(&config, &quiet()).unwrap();
    assert!(third.skipped.is_empty());
    assert_eq!(third.count(ComparisonStatus::DifferencesFound), 3);
}

#[test]
fn test_one_broken_pair_does_not_stop_the_run() {
    let fixture = TestFixture::new().unwrap();
    populate(&fixture);
    fixture
        .create_raw(&fixture.before_dir(), "broken.parquet", b"not parquet")
        .unwrap();
    fixture
        .create_parquet(&fixture.after_dir(), "broken.parquet", &[(1, Some("a"), 1.0)])
        .unwrap();

    let summary = run(&fixture.config(&["parquet"]), &quiet()).unwrap();
    assert_eq!(summary.compared(), 4);
    let broken = summary
        .outcomes
        .iter()
        .find(|o| o.pair.relative_path == PathBuf::from("broken.parquet"))
        .unwrap();
    assert_eq!(broken.status, ComparisonStatus::Error);
    assert!(broken.error.as_deref().unwrap().contains("broken.parquet"));
    assert!(broken.result.is_none());
    assert_eq!(summary.count(ComparisonStatus::ChecksumMatch), 1);
}

#[test]
fn test_missing_output_directory_is_config_error() {
    let fixture = TestFixture::new().unwrap();
    let mut config = fixture.config(&["parquet"]);
    config.output_directory = None;
    let err = run(&config, &quiet()).unwrap_err();
    assert!(err.is_fatal());
}

fn tolerance_rule(pattern: &str, tolerance: f64) -> Vec<pqcompare::config::FileSpecificRule> {
    vec![pqcompare::config::FileSpecificRule {
        pattern: pattern.to_string(),
        float_tolerance: Some(tolerance),
        ignore_columns: Vec::new(),
        fuzzy_match_threshold: None,
    }]
}
