//! Error types for pqcompare operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PqcompareError>;

#[derive(Error, Debug)]
pub enum PqcompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to load '{path}': {message}")]
    Load { path: PathBuf, message: String },

    #[error("Invalid dataset: {message}")]
    Dataset { message: String },

    #[error("Fuzzy matching would score {pairs} candidate pairs (limit {limit}); configure fuzzy_blocking or raise fuzzy_max_pairs")]
    FuzzyLimit { pairs: u64, limit: u64 },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl PqcompareError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    /// Configuration errors abort the whole run; everything else is scoped
    /// to the file pair that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
