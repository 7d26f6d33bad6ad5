//! Dataset loading for Parquet and delimited text files

use crate::dataset::{ColumnDescriptor, Dataset, LogicalType, Value};
use crate::error::{PqcompareError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use parquet::basic::{ConvertedType, LogicalType as ParquetLogicalType, Repetition, Type as PhysicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use parquet::schema::types::Type as SchemaType;
use std::fs::File;
use std::path::Path;

/// Rows sampled when deciding whether a string column holds dates
const TEMPORAL_SAMPLE_ROWS: usize = 1000;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Csv,
    Tsv,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "parquet" | "pq" => Some(FileFormat::Parquet),
            "csv" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            _ => None,
        }
    }
}

/// Loader turning files into immutable [`Dataset`]s
pub struct DataLoader;

impl DataLoader {
    pub fn is_supported_format(path: &Path) -> bool {
        FileFormat::from_path(path).is_some()
    }

    /// Load a file, dispatching on its extension. Any failure names the file.
    pub fn load_file(path: &Path) -> Result<Dataset> {
        if !path.is_file() {
            return Err(PqcompareError::load(path, "file not found"));
        }

        let format = FileFormat::from_path(path)
            .ok_or_else(|| PqcompareError::load(path, "unsupported file format"))?;

        let dataset = match format {
            FileFormat::Parquet => Self::load_parquet(path),
            FileFormat::Csv => Self::load_delimited(path, b','),
            FileFormat::Tsv => Self::load_delimited(path, b'\t'),
        };

        let dataset = dataset.map_err(|e| match e {
            PqcompareError::Load { .. } => e,
            other => PqcompareError::load(path, other.to_string()),
        })?;

        log::debug!(
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            dataset.row_count(),
            dataset.column_count()
        );
        Ok(dataset)
    }

    fn load_parquet(path: &Path) -> Result<Dataset> {
        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;

        let schema = reader.metadata().file_metadata().schema_descr().root_schema().clone();
        let columns: Vec<ColumnDescriptor> = schema
            .get_fields()
            .iter()
            .map(|field| parquet_column(field))
            .collect();

        let mut data: Vec<Vec<Value>> = columns.iter().map(|_| Vec::new()).collect();
        for row in reader.get_row_iter(None)? {
            let row = row?;
            for (idx, (_, field)) in row.get_column_iter().enumerate() {
                let Some(column) = data.get_mut(idx) else {
                    return Err(PqcompareError::dataset(format!(
                        "row has more fields than the {} declared columns",
                        columns.len()
                    )));
                };
                column.push(conform(field_value(field), columns[idx].logical_type, field));
            }
        }

        Dataset::new(columns, data)
    }

    fn load_delimited(path: &Path, delimiter: u8) -> Result<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .from_path(path)?;
        let headers = reader.headers()?.clone();

        let mut raw: Vec<Vec<String>> = headers.iter().map(|_| Vec::new()).collect();
        for record in reader.records() {
            let record = record?;
            for (idx, column) in raw.iter_mut().enumerate() {
                column.push(record.get(idx).unwrap_or("").to_string());
            }
        }

        let mut columns = Vec::with_capacity(raw.len());
        let mut data = Vec::with_capacity(raw.len());
        for (name, cells) in headers.iter().zip(raw) {
            let logical_type = infer_text_type(&cells);
            let values: Vec<Value> = cells.iter().map(|c| parse_text(c, logical_type)).collect();
            let nullable = values.iter().any(Value::is_null);
            columns.push(ColumnDescriptor {
                name: name.to_string(),
                logical_type,
                nullable,
            });
            data.push(values);
        }

        Dataset::new(columns, data)
    }

    /// Convert string columns of "before" that mostly parse as dates to
    /// temporal, applying the same conversion to "after" so both sides stay
    /// comparable. Cells that do not parse keep their text as
    /// [`Value::Other`].
    pub fn promote_temporal_columns(
        mut before: Dataset,
        mut after: Dataset,
        threshold: f64,
    ) -> Result<(Dataset, Dataset)> {
        let candidates: Vec<String> = before
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.logical_type == LogicalType::String)
            .filter(|(idx, _)| parse_rate(before.column_values(*idx)) >= threshold)
            .map(|(_, c)| c.name.clone())
            .collect();

        for name in candidates {
            log::debug!("Treating '{}' as a datetime column", name);
            promote(&mut before, &name)?;
            if after
                .column(&name)
                .map_or(false, |c| c.logical_type == LogicalType::String)
            {
                promote(&mut after, &name)?;
            }
        }

        Ok((before, after))
    }
}

fn promote(dataset: &mut Dataset, name: &str) -> Result<()> {
    let Some(idx) = dataset.column_index(name) else {
        return Ok(());
    };
    let values = dataset
        .column_values(idx)
        .iter()
        .map(|v| match v {
            Value::String(s) if s.trim().is_empty() => Value::Null,
            Value::String(s) => parse_temporal(s)
                .map(Value::Temporal)
                .unwrap_or_else(|| Value::Other(s.clone())),
            other => other.clone(),
        })
        .collect();
    dataset.replace_column(idx, LogicalType::Temporal, values)
}

/// Share of sampled non-null strings that parse as a date or datetime.
/// A column with no non-null samples is never promoted.
fn parse_rate(values: &[Value]) -> f64 {
    let samples: Vec<&str> = values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        })
        .take(TEMPORAL_SAMPLE_ROWS)
        .collect();
    if samples.is_empty() {
        return 0.0;
    }
    let parsed = samples.iter().filter(|s| parse_temporal(s).is_some()).count();
    parsed as f64 / samples.len() as f64
}

pub fn parse_temporal(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Narrowest type that every non-empty cell parses as:
/// integer, then float, then boolean, else string
fn infer_text_type(cells: &[String]) -> LogicalType {
    let mut possible_integer = true;
    let mut possible_float = true;
    let mut possible_boolean = true;
    let mut seen = false;

    for cell in cells.iter().filter(|c| !c.is_empty()) {
        seen = true;
        if possible_integer && cell.parse::<i64>().is_err() {
            possible_integer = false;
        }
        if possible_float && cell.parse::<f64>().is_err() {
            possible_float = false;
        }
        if possible_boolean && parse_bool(cell).is_none() {
            possible_boolean = false;
        }
        if !possible_integer && !possible_float && !possible_boolean {
            break;
        }
    }

    if !seen {
        LogicalType::String
    } else if possible_integer {
        LogicalType::Integer
    } else if possible_float {
        LogicalType::Float
    } else if possible_boolean {
        LogicalType::Boolean
    } else {
        LogicalType::String
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_text(cell: &str, logical_type: LogicalType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    let parsed = match logical_type {
        LogicalType::Integer => cell.parse().ok().map(Value::Integer),
        LogicalType::Float => cell.parse().ok().map(Value::Float),
        LogicalType::Boolean => parse_bool(cell).map(Value::Boolean),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(cell.to_string()))
}

fn parquet_column(field: &SchemaType) -> ColumnDescriptor {
    let info = field.get_basic_info();
    let nullable = !info.has_repetition() || info.repetition() != Repetition::REQUIRED;
    ColumnDescriptor {
        name: field.name().to_string(),
        logical_type: parquet_logical_type(field),
        nullable,
    }
}

/// Resolve the closed logical type from the Parquet annotations, falling
/// back to the physical type
fn parquet_logical_type(field: &SchemaType) -> LogicalType {
    let physical = match field {
        SchemaType::PrimitiveType { physical_type, .. } => *physical_type,
        SchemaType::GroupType { .. } => return LogicalType::Other,
    };
    let info = field.get_basic_info();

    match info.logical_type() {
        Some(ParquetLogicalType::String) | Some(ParquetLogicalType::Enum) | Some(ParquetLogicalType::Json) => {
            return LogicalType::String
        }
        Some(ParquetLogicalType::Integer { .. }) => return LogicalType::Integer,
        Some(ParquetLogicalType::Decimal { .. }) => return LogicalType::Float,
        Some(ParquetLogicalType::Date) | Some(ParquetLogicalType::Timestamp { .. }) => {
            return LogicalType::Temporal
        }
        Some(ParquetLogicalType::Time { .. }) | Some(ParquetLogicalType::Uuid) => return LogicalType::Other,
        _ => {}
    }

    match info.converted_type() {
        ConvertedType::UTF8 | ConvertedType::ENUM | ConvertedType::JSON => return LogicalType::String,
        ConvertedType::INT_8
        | ConvertedType::INT_16
        | ConvertedType::INT_32
        | ConvertedType::INT_64
        | ConvertedType::UINT_8
        | ConvertedType::UINT_16
        | ConvertedType::UINT_32
        | ConvertedType::UINT_64 => return LogicalType::Integer,
        ConvertedType::DECIMAL => return LogicalType::Float,
        ConvertedType::DATE | ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS => {
            return LogicalType::Temporal
        }
        ConvertedType::TIME_MILLIS | ConvertedType::TIME_MICROS => return LogicalType::Other,
        _ => {}
    }

    match physical {
        PhysicalType::BOOLEAN => LogicalType::Boolean,
        PhysicalType::INT32 | PhysicalType::INT64 => LogicalType::Integer,
        PhysicalType::INT96 => LogicalType::Temporal,
        PhysicalType::FLOAT | PhysicalType::DOUBLE => LogicalType::Float,
        PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => LogicalType::Binary,
    }
}

fn field_value(field: &Field) -> Value {
    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Boolean(*b),
        Field::Byte(v) => Value::Integer(i64::from(*v)),
        Field::Short(v) => Value::Integer(i64::from(*v)),
        Field::Int(v) => Value::Integer(i64::from(*v)),
        Field::Long(v) => Value::Integer(*v),
        Field::UByte(v) => Value::Integer(i64::from(*v)),
        Field::UShort(v) => Value::Integer(i64::from(*v)),
        Field::UInt(v) => Value::Integer(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Other(v.to_string())),
        Field::Float(v) => Value::Float(f64::from(*v)),
        Field::Double(v) => Value::Float(*v),
        Field::Decimal(d) => {
            let unscaled = BigInt::from_signed_bytes_be(d.data());
            match unscaled.to_f64() {
                Some(v) => Value::Float(v / 10f64.powi(d.scale())),
                None => Value::Other(field.to_string()),
            }
        }
        Field::Str(s) => Value::String(s.clone()),
        Field::Bytes(b) => Value::Binary(b.data().to_vec()),
        Field::Date(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(*days))))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Temporal)
            .unwrap_or_else(|| Value::Other(field.to_string())),
        Field::TimestampMillis(ms) => timestamp(ms.div_euclid(1_000), ms.rem_euclid(1_000) * 1_000_000)
            .unwrap_or_else(|| Value::Other(field.to_string())),
        Field::TimestampMicros(us) => timestamp(us.div_euclid(1_000_000), us.rem_euclid(1_000_000) * 1_000)
            .unwrap_or_else(|| Value::Other(field.to_string())),
        other => Value::Other(other.to_string()),
    }
}

fn timestamp(seconds: i64, nanos: i64) -> Option<Value> {
    let nanos = u32::try_from(nanos).ok()?;
    DateTime::from_timestamp(seconds, nanos).map(|dt| Value::Temporal(dt.naive_utc()))
}

/// Keep cell values consistent with the declared column type
fn conform(value: Value, logical_type: LogicalType, field: &Field) -> Value {
    match (logical_type, &value) {
        (_, Value::Null) => value,
        (LogicalType::Other, Value::Other(_)) => value,
        (LogicalType::Other, _) => Value::Other(field.to_string()),
        (LogicalType::String, Value::Binary(bytes)) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => value,
        },
        _ => value,
    }
}
