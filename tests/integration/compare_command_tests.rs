//! CLI commands executed end to end

use crate::common::CliTestRunner;
use std::fs;

#[test]
fn test_compare_command_writes_report_on_differences() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let before = fixture
        .create_csv(&fixture.before_dir(), "t.csv", &[vec!["id", "name"], vec!["1", "a"], vec!["2", "b"]])
        .unwrap();
    let after = fixture
        .create_csv(&fixture.after_dir(), "t.csv", &[vec!["id", "name"], vec!["1", "a"], vec!["2", "c"]])
        .unwrap();
    let report_dir = fixture.output_dir();

    runner.expect_success(&[
        "compare",
        before.to_str().unwrap(),
        after.to_str().unwrap(),
        "--report-dir",
        report_dir.to_str().unwrap(),
    ]);

    let reports: Vec<_> = fs::read_dir(&report_dir).unwrap().collect();
    assert_eq!(reports.len(), 1);
}

#[test]
fn test_compare_command_without_differences_writes_nothing() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let before = fixture
        .create_csv(&fixture.before_dir(), "t.csv", &[vec!["id", "v"], vec!["1", "1.0"]])
        .unwrap();
    let after = fixture
        .create_csv(&fixture.after_dir(), "t.csv", &[vec!["id", "v"], vec!["1", "1.001"]])
        .unwrap();
    let report_dir = fixture.output_dir();

    runner.expect_success(&[
        "compare",
        before.to_str().unwrap(),
        after.to_str().unwrap(),
        "--tolerance",
        "0.01",
        "--json",
        "--report-dir",
        report_dir.to_str().unwrap(),
    ]);
    assert!(!report_dir.exists());
}

#[test]
fn test_compare_command_applies_directory_rules() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let config = fixture
        .create_config_yaml("file_specific_rules:\n  - pattern: \"finance/*.csv\"\n    float_tolerance: 0.01\n")
        .unwrap();

    let compare_into = |folder: &str| {
        let relative = format!("{}/q1.csv", folder);
        let before = fixture
            .create_csv(&fixture.before_dir(), &relative, &[vec!["id", "v"], vec!["1", "1.0"], vec!["2", "2.0"]])
            .unwrap();
        let after = fixture
            .create_csv(&fixture.after_dir(), &relative, &[vec!["id", "v"], vec!["1", "1.004"], vec!["2", "2.0"]])
            .unwrap();
        let report_dir = fixture.output_dir().join(folder);
        runner.expect_success(&[
            "compare",
            before.to_str().unwrap(),
            after.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--json",
            "--report-dir",
            report_dir.to_str().unwrap(),
        ]);
        report_dir.exists()
    };

    assert!(!compare_into("finance"));
    assert!(compare_into("operations"));
}

#[test]
fn test_compare_command_missing_file_fails() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let missing = fixture.before_dir().join("missing.parquet");
    let error = runner.expect_failure(&["compare", missing.to_str().unwrap(), missing.to_str().unwrap()]);
    assert!(error.to_string().contains("missing.parquet"));
}

#[test]
fn test_run_command_uses_config_file() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_csv(&fixture.before_dir(), "a.csv", &[vec!["id"], vec!["1"]])
        .unwrap();
    fixture
        .create_csv(&fixture.after_dir(), "a.csv", &[vec!["id"], vec!["1"]])
        .unwrap();
    let yaml = format!(
        "base_path_before: {}\nbase_path_after: {}\noutput_directory: {}\nfile_extensions: [csv]\n",
        fixture.before_dir().display(),
        fixture.after_dir().display(),
        fixture.output_dir().display()
    );
    let config = fixture.create_config_yaml(&yaml).unwrap();

    runner.expect_success(&["run", "--config", config.to_str().unwrap(), "--no-progress", "--workers", "1"]);
    assert!(fixture.output_dir().join("comparison_log.json").exists());
}

#[test]
fn test_run_command_rejects_invalid_config() {
    let runner = CliTestRunner::new().unwrap();
    let config = runner
        .fixture()
        .create_config_yaml("fuzzy_match_threshold: 2.0\n")
        .unwrap();
    let error = runner.expect_failure(&["run", "--config", config.to_str().unwrap()]);
    assert!(error.is_fatal());
}
