//! # pqcompare
//!
//! Regression comparison of "before" and "after" tabular datasets: schema
//! reconciliation, order-independent digests, key inference, keyed row
//! diffs and a fuzzy linkage fallback when no key exists.

pub mod change_detection;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod data;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod fuzzy;
pub mod hash;
pub mod key_inference;
pub mod keyed_diff;
pub mod output;
pub mod progress;
pub mod runner;
pub mod schema;
pub mod tracking;

pub use change_detection::{ComparisonStatus, DiffResult};
pub use compare::{compare, ComparisonEngine};
pub use config::{CompareConfig, FileRules};
pub use dataset::{ColumnDescriptor, Dataset, LogicalType, Value};
pub use error::{PqcompareError, Result};
