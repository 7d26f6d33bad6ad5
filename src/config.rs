//! Run configuration loaded from YAML and resolved into per-file rules
//!
//! Configuration is validated once, before any comparison runs. The engine
//! only ever sees an immutable [`FileRules`] value resolved for one file pair.

use crate::error::{PqcompareError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1.0e-6;
pub const DEFAULT_KEY_UNIQUENESS_THRESHOLD: f64 = 0.99;
pub const DEFAULT_MAX_KEY_COLUMNS: usize = 3;
pub const DEFAULT_FUZZY_MATCH_THRESHOLD: f64 = 0.8;
pub const DEFAULT_FUZZY_MAX_NUMERIC_DIFFERENCE: f64 = 0.25;
pub const DEFAULT_FUZZY_MAX_PAIRS: u64 = 4_000_000;
pub const DEFAULT_DATETIME_PARSE_THRESHOLD: f64 = 0.9;

/// How numeric differences are measured against the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceMode {
    /// `|a - b| <= tolerance`
    #[default]
    Absolute,
    /// `|a - b| <= tolerance * max(|a|, |b|)`
    Relative,
}

/// When a schema difference stops the data comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Only an empty comparable column set is a mismatch
    #[default]
    Lenient,
    /// Any added, removed or retyped column is a mismatch
    Strict,
}

/// Pre-partitioning of rows before fuzzy scoring
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzyBlocking {
    #[default]
    Off,
    /// Pick a mid-cardinality column automatically
    Auto,
    /// Block on a named column
    Column(String),
}

/// Override block applied to files whose relative path matches `pattern`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpecificRule {
    pub pattern: String,
    #[serde(default)]
    pub float_tolerance: Option<f64>,
    #[serde(default)]
    pub ignore_columns: Vec<String>,
    #[serde(default)]
    pub fuzzy_match_threshold: Option<f64>,
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    #[serde(default)]
    pub base_path_before: Option<PathBuf>,
    #[serde(default)]
    pub base_path_after: Option<PathBuf>,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,
    #[serde(default)]
    pub tolerance_mode: ToleranceMode,
    #[serde(default = "default_key_uniqueness_threshold")]
    pub key_uniqueness_threshold: f64,
    #[serde(default = "default_max_key_columns")]
    pub max_key_columns: usize,
    #[serde(default = "default_fuzzy_match_threshold")]
    pub fuzzy_match_threshold: f64,
    #[serde(default = "default_fuzzy_max_numeric_difference")]
    pub fuzzy_max_numeric_difference: f64,
    #[serde(default = "default_fuzzy_max_pairs")]
    pub fuzzy_max_pairs: u64,
    #[serde(default)]
    pub fuzzy_blocking: FuzzyBlocking,
    #[serde(default = "default_datetime_parse_threshold")]
    pub datetime_parse_threshold: f64,
    #[serde(default)]
    pub global_ignore_columns: Vec<String>,
    #[serde(default)]
    pub file_specific_rules: Vec<FileSpecificRule>,
    #[serde(default)]
    pub force_full_diff: bool,
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
}

fn default_float_tolerance() -> f64 {
    DEFAULT_FLOAT_TOLERANCE
}

fn default_key_uniqueness_threshold() -> f64 {
    DEFAULT_KEY_UNIQUENESS_THRESHOLD
}

fn default_max_key_columns() -> usize {
    DEFAULT_MAX_KEY_COLUMNS
}

fn default_fuzzy_match_threshold() -> f64 {
    DEFAULT_FUZZY_MATCH_THRESHOLD
}

fn default_fuzzy_max_numeric_difference() -> f64 {
    DEFAULT_FUZZY_MAX_NUMERIC_DIFFERENCE
}

fn default_fuzzy_max_pairs() -> u64 {
    DEFAULT_FUZZY_MAX_PAIRS
}

fn default_datetime_parse_threshold() -> f64 {
    DEFAULT_DATETIME_PARSE_THRESHOLD
}

fn default_file_extensions() -> Vec<String> {
    vec!["parquet".to_string()]
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            base_path_before: None,
            base_path_after: None,
            output_directory: None,
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
            tolerance_mode: ToleranceMode::default(),
            key_uniqueness_threshold: DEFAULT_KEY_UNIQUENESS_THRESHOLD,
            max_key_columns: DEFAULT_MAX_KEY_COLUMNS,
            fuzzy_match_threshold: DEFAULT_FUZZY_MATCH_THRESHOLD,
            fuzzy_max_numeric_difference: DEFAULT_FUZZY_MAX_NUMERIC_DIFFERENCE,
            fuzzy_max_pairs: DEFAULT_FUZZY_MAX_PAIRS,
            fuzzy_blocking: FuzzyBlocking::default(),
            datetime_parse_threshold: DEFAULT_DATETIME_PARSE_THRESHOLD,
            global_ignore_columns: Vec::new(),
            file_specific_rules: Vec::new(),
            force_full_diff: false,
            schema_policy: SchemaPolicy::default(),
            file_extensions: default_file_extensions(),
        }
    }
}

impl CompareConfig {
    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PqcompareError::config(format!(
                "Cannot read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: CompareConfig = serde_yaml::from_str(content)
            .map_err(|e| PqcompareError::config(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every comparison meaningless
    pub fn validate(&self) -> Result<()> {
        check_tolerance("float_tolerance", self.float_tolerance)?;
        check_unit_interval("key_uniqueness_threshold", self.key_uniqueness_threshold)?;
        if self.key_uniqueness_threshold == 0.0 {
            return Err(PqcompareError::config(
                "key_uniqueness_threshold must be greater than 0",
            ));
        }
        check_unit_interval("fuzzy_match_threshold", self.fuzzy_match_threshold)?;
        check_unit_interval("datetime_parse_threshold", self.datetime_parse_threshold)?;

        if self.max_key_columns == 0 {
            return Err(PqcompareError::config("max_key_columns must be at least 1"));
        }
        if !self.fuzzy_max_numeric_difference.is_finite() || self.fuzzy_max_numeric_difference <= 0.0 {
            return Err(PqcompareError::config(format!(
                "fuzzy_max_numeric_difference must be a positive number, got {}",
                self.fuzzy_max_numeric_difference
            )));
        }
        if self.fuzzy_max_pairs == 0 {
            return Err(PqcompareError::config("fuzzy_max_pairs must be at least 1"));
        }
        if self.file_extensions.is_empty() {
            return Err(PqcompareError::config("file_extensions must not be empty"));
        }
        if let FuzzyBlocking::Column(name) = &self.fuzzy_blocking {
            if name.trim().is_empty() {
                return Err(PqcompareError::config("fuzzy_blocking column name is empty"));
            }
        }

        for rule in &self.file_specific_rules {
            PathPattern::new(&rule.pattern)?;
            if let Some(tolerance) = rule.float_tolerance {
                check_tolerance(&format!("float_tolerance for '{}'", rule.pattern), tolerance)?;
            }
            if let Some(threshold) = rule.fuzzy_match_threshold {
                check_unit_interval(
                    &format!("fuzzy_match_threshold for '{}'", rule.pattern),
                    threshold,
                )?;
            }
        }

        Ok(())
    }

    /// Both base paths, required by directory runs
    pub fn base_paths(&self) -> Result<(PathBuf, PathBuf)> {
        match (&self.base_path_before, &self.base_path_after) {
            (Some(before), Some(after)) => Ok((before.clone(), after.clone())),
            _ => Err(PqcompareError::config(
                "base_path_before and base_path_after are required",
            )),
        }
    }

    /// Resolve the rules for one file. The first matching file-specific rule
    /// overrides the global values; its ignore list extends the global one.
    pub fn rules_for(&self, relative_path: &Path) -> Result<FileRules> {
        let mut rules = FileRules::from_config(self);

        for rule in &self.file_specific_rules {
            let pattern = PathPattern::new(&rule.pattern)?;
            if !pattern.matches(relative_path) {
                continue;
            }

            log::debug!(
                "Applying file-specific rule '{}' to {}",
                rule.pattern,
                relative_path.display()
            );
            if let Some(tolerance) = rule.float_tolerance {
                rules.float_tolerance = tolerance;
            }
            if let Some(threshold) = rule.fuzzy_match_threshold {
                rules.fuzzy_match_threshold = threshold;
            }
            for column in &rule.ignore_columns {
                if !rules.ignore_columns.contains(column) {
                    rules.ignore_columns.push(column.clone());
                }
            }
            break;
        }

        Ok(rules)
    }
}

fn check_tolerance(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PqcompareError::config(format!(
            "{} must be a finite number >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PqcompareError::config(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Comparison options for a single file pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRules {
    pub float_tolerance: f64,
    pub tolerance_mode: ToleranceMode,
    pub ignore_columns: Vec<String>,
    pub key_uniqueness_threshold: f64,
    pub max_key_columns: usize,
    pub fuzzy_match_threshold: f64,
    pub fuzzy_max_numeric_difference: f64,
    pub fuzzy_max_pairs: u64,
    pub fuzzy_blocking: FuzzyBlocking,
    pub datetime_parse_threshold: f64,
    pub force_full_diff: bool,
    pub schema_policy: SchemaPolicy,
}

impl FileRules {
    pub fn from_config(config: &CompareConfig) -> Self {
        Self {
            float_tolerance: config.float_tolerance,
            tolerance_mode: config.tolerance_mode,
            ignore_columns: config.global_ignore_columns.clone(),
            key_uniqueness_threshold: config.key_uniqueness_threshold,
            max_key_columns: config.max_key_columns,
            fuzzy_match_threshold: config.fuzzy_match_threshold,
            fuzzy_max_numeric_difference: config.fuzzy_max_numeric_difference,
            fuzzy_max_pairs: config.fuzzy_max_pairs,
            fuzzy_blocking: config.fuzzy_blocking.clone(),
            datetime_parse_threshold: config.datetime_parse_threshold,
            force_full_diff: config.force_full_diff,
            schema_policy: config.schema_policy,
        }
    }

    pub fn is_ignored(&self, column: &str) -> bool {
        self.ignore_columns.iter().any(|c| c == column)
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            value: self.float_tolerance,
            mode: self.tolerance_mode,
        }
    }
}

/// Numeric equality bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub value: f64,
    pub mode: ToleranceMode,
}

impl Tolerance {
    pub fn absolute(value: f64) -> Self {
        Self {
            value,
            mode: ToleranceMode::Absolute,
        }
    }

    /// True when `a` and `b` are considered equal; callers handle NaN first
    pub fn within(&self, a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        match self.mode {
            ToleranceMode::Absolute => diff <= self.value,
            ToleranceMode::Relative => diff <= self.value * a.abs().max(b.abs()),
        }
    }

    /// Integer form of [`Tolerance::within`]. The difference is taken
    /// exactly so values beyond 2^53 never collapse together.
    pub fn within_integers(&self, a: i64, b: i64) -> bool {
        let diff = a.abs_diff(b);
        match self.mode {
            ToleranceMode::Absolute => {
                if self.value >= u64::MAX as f64 {
                    true
                } else {
                    diff <= self.value.floor() as u64
                }
            }
            ToleranceMode::Relative => {
                let magnitude = a.unsigned_abs().max(b.unsigned_abs());
                diff as f64 <= self.value * magnitude as f64
            }
        }
    }

    /// Bucket width for digest quantisation. Relative tolerances have no
    /// fixed bucket, so they hash exactly.
    pub fn bucket_width(&self) -> Option<f64> {
        match self.mode {
            ToleranceMode::Absolute if self.value > 0.0 => Some(self.value),
            _ => None,
        }
    }
}

impl Default for FileRules {
    fn default() -> Self {
        Self::from_config(&CompareConfig::default())
    }
}

/// Glob pattern matched against a relative path from the right:
/// `*` stays within a path segment, `**` crosses segments, `?` is one char.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(PqcompareError::config("file-specific rule has an empty pattern"));
        }
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            PqcompareError::config(format!("Invalid pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.regex.is_match(&normalized)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    let (prefix, body) = match pattern.strip_prefix('/') {
        Some(rest) => ("^", rest),
        None => ("(?:^|/)", pattern.as_str()),
    };

    let chars: Vec<char> = body.chars().collect();
    let mut re = String::from(prefix);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    re
}
