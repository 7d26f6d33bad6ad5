//! Configuration loading and rule resolution

use crate::common::TestFixture;
use pqcompare::config::{FuzzyBlocking, SchemaPolicy, ToleranceMode};
use pqcompare::{CompareConfig, PqcompareError};
use std::path::{Path, PathBuf};

#[test]
fn test_load_full_configuration_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_config_yaml(
            r#"
base_path_before: /data/before
base_path_after: /data/after
output_directory: /data/reports
float_tolerance: 0.001
tolerance_mode: relative
key_uniqueness_threshold: 0.95
max_key_columns: 2
fuzzy_match_threshold: 0.7
fuzzy_max_numeric_difference: 0.5
fuzzy_max_pairs: 1000
fuzzy_blocking: auto
datetime_parse_threshold: 0.8
global_ignore_columns: [updated_at]
force_full_diff: true
schema_policy: strict
file_extensions: [parquet, csv]
file_specific_rules:
  - pattern: "ledger/*.parquet"
    float_tolerance: 0.05
    ignore_columns: [batch]
    fuzzy_match_threshold: 0.9
"#,
        )
        .unwrap();

    let config = CompareConfig::load(&path).unwrap();
    assert_eq!(config.base_path_before, Some(PathBuf::from("/data/before")));
    assert_eq!(config.tolerance_mode, ToleranceMode::Relative);
    assert_eq!(config.max_key_columns, 2);
    assert_eq!(config.fuzzy_max_pairs, 1000);
    assert_eq!(config.fuzzy_blocking, FuzzyBlocking::Auto);
    assert_eq!(config.schema_policy, SchemaPolicy::Strict);
    assert!(config.force_full_diff);
    assert_eq!(config.file_extensions.len(), 2);

    let rules = config.rules_for(Path::new("ledger/january.parquet")).unwrap();
    assert_eq!(rules.float_tolerance, 0.05);
    assert_eq!(rules.fuzzy_match_threshold, 0.9);
    assert_eq!(rules.ignore_columns, vec!["updated_at".to_string(), "batch".to_string()]);
    assert_eq!(rules.tolerance_mode, ToleranceMode::Relative);
    assert!(rules.force_full_diff);

    let other = config.rules_for(Path::new("crm/contacts.parquet")).unwrap();
    assert_eq!(other.float_tolerance, 0.001);
    assert_eq!(other.ignore_columns, vec!["updated_at".to_string()]);
}

#[test]
fn test_missing_file_is_config_error() {
    let fixture = TestFixture::new().unwrap();
    let err = CompareConfig::load(&fixture.root().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, PqcompareError::Config { .. }));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let err = CompareConfig::from_yaml_str("float_tolerance: [not, a, number]").unwrap_err();
    assert!(err.is_fatal());
    let err = CompareConfig::from_yaml_str("tolerance_mode: sideways").unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_rule_overrides_are_validated() {
    let yaml = r#"
file_specific_rules:
  - pattern: "*.parquet"
    float_tolerance: -1
"#;
    assert!(CompareConfig::from_yaml_str(yaml).is_err());

    let yaml = r#"
file_specific_rules:
  - pattern: ""
"#;
    assert!(CompareConfig::from_yaml_str(yaml).is_err());
}

#[test]
fn test_directory_runs_need_both_base_paths() {
    let config = CompareConfig {
        base_path_before: Some(PathBuf::from("before")),
        ..CompareConfig::default()
    };
    assert!(config.base_paths().is_err());
}
