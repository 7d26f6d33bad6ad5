//! Edge cases around discovery and file handling

use crate::common::TestFixture;
use pqcompare::discovery::{find_unmatched_files, pair_files};
use pqcompare::runner::{run, RunOptions};
use std::path::PathBuf;

#[test]
fn test_deeply_nested_pairs_keep_relative_paths() {
    let fixture = TestFixture::new().unwrap();
    for side in [fixture.before_dir(), fixture.after_dir()] {
        fixture
            .create_csv(&side, "a/b/c/d/deep.csv", &[vec!["id"], vec!["1"]])
            .unwrap();
    }

    let pairs = pair_files(&fixture.before_dir(), &fixture.after_dir(), &["csv".to_string()]).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].relative_path, PathBuf::from("a/b/c/d/deep.csv"));
}

#[test]
fn test_other_extensions_are_ignored() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_raw(&fixture.before_dir(), "notes.txt", b"hello")
        .unwrap();
    fixture
        .create_raw(&fixture.after_dir(), "notes.txt", b"hello")
        .unwrap();

    let pairs = pair_files(&fixture.before_dir(), &fixture.after_dir(), &["parquet".to_string()]).unwrap();
    assert!(pairs.is_empty());
    let unmatched = find_unmatched_files(&fixture.before_dir(), &fixture.after_dir(), &["parquet".to_string()]).unwrap();
    assert!(unmatched.is_empty());
}

#[test]
fn test_missing_base_path_fails_the_run() {
    let fixture = TestFixture::new().unwrap();
    let mut config = fixture.config(&["csv"]);
    config.base_path_after = Some(fixture.root().join("nowhere"));
    let options = RunOptions {
        show_progress: false,
        print_results: false,
        ..RunOptions::default()
    };
    assert!(run(&config, &options).is_err());
}

#[test]
fn test_empty_trees_produce_an_empty_summary() {
    let fixture = TestFixture::new().unwrap();
    let options = RunOptions {
        show_progress: false,
        print_results: false,
        ..RunOptions::default()
    };
    let summary = run(&fixture.config(&["csv"]), &options).unwrap();
    assert_eq!(summary.compared(), 0);
    assert!(summary.unmatched.is_empty());
}
