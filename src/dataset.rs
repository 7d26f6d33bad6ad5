//! In-memory columnar dataset model
//!
//! A [`Dataset`] is loaded once per comparison and never mutated by the
//! comparison engine. Values are stored column-major; rows are addressed
//! positionally.

use crate::error::{PqcompareError, Result};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Closed set of logical column types, resolved once at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Integer,
    Float,
    String,
    Boolean,
    Temporal,
    Binary,
    Other,
}

impl LogicalType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, LogicalType::Integer | LogicalType::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Integer => "integer",
            LogicalType::Float => "float",
            LogicalType::String => "string",
            LogicalType::Boolean => "boolean",
            LogicalType::Temporal => "temporal",
            LogicalType::Binary => "binary",
            LogicalType::Other => "other",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Temporal(NaiveDateTime),
    Binary(Vec<u8>),
    Other(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by tolerance comparisons and fuzzy scoring
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Canonical string coercion used only for columns whose logical type
    /// differs between the two datasets. `None` means null.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(canonical_float_string(*f)),
            Value::String(s) | Value::Other(s) => Some(s.clone()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Temporal(ts) => Some(canonical_temporal_string(ts)),
            Value::Binary(bytes) => Some(hex_string(bytes)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) | Value::Other(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Temporal(ts) => f.write_str(&canonical_temporal_string(ts)),
            Value::Binary(bytes) => f.write_str(&hex_string(bytes)),
        }
    }
}

/// Whole floats render without a fractional part so that an integer column
/// retyped to float still coerces to the same text.
pub fn canonical_float_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn canonical_temporal_string(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Column descriptor: name, logical type and nullability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: true,
        }
    }

    pub fn required(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: false,
        }
    }
}

/// An immutable columnar table
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<ColumnDescriptor>,
    data: Vec<Vec<Value>>,
    row_count: usize,
}

impl Dataset {
    /// Build from column-major data. Every column must have the same length
    /// and column names must be unique.
    pub fn new(columns: Vec<ColumnDescriptor>, data: Vec<Vec<Value>>) -> Result<Self> {
        if columns.len() != data.len() {
            return Err(PqcompareError::dataset(format!(
                "{} column descriptors but {} value columns",
                columns.len(),
                data.len()
            )));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PqcompareError::dataset(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        let row_count = data.first().map(|c| c.len()).unwrap_or(0);
        if let Some((idx, column)) = data.iter().enumerate().find(|(_, c)| c.len() != row_count) {
            return Err(PqcompareError::dataset(format!(
                "column '{}' has {} values, expected {}",
                columns[idx].name,
                column.len(),
                row_count
            )));
        }

        Ok(Self {
            columns,
            data,
            row_count,
        })
    }

    /// Build from row-major data
    pub fn from_rows(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let width = columns.len();
        let mut data: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(PqcompareError::dataset(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    width
                )));
            }
            for (col_idx, value) in row.into_iter().enumerate() {
                data[col_idx].push(value);
            }
        }

        Self::new(columns, data)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_values(&self, index: usize) -> &[Value] {
        &self.data[index]
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.data[column][row]
    }

    /// Swap one column's type and values. Used by the loader while a dataset
    /// is still being prepared; the engine never calls this.
    pub(crate) fn replace_column(
        &mut self,
        index: usize,
        logical_type: LogicalType,
        values: Vec<Value>,
    ) -> Result<()> {
        if values.len() != self.row_count {
            return Err(PqcompareError::dataset(format!(
                "replacement for '{}' has {} values, expected {}",
                self.columns[index].name,
                values.len(),
                self.row_count
            )));
        }
        self.columns[index].logical_type = logical_type;
        self.data[index] = values;
        Ok(())
    }
}
