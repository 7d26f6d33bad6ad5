//! Common test utilities and helpers

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use pqcompare::{ColumnDescriptor, CompareConfig, Dataset, LogicalType, Result, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test fixture with separate "before", "after" and output directories
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("before"))?;
        fs::create_dir_all(temp_dir.path().join("after"))?;
        Ok(Self { temp_dir })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn before_dir(&self) -> PathBuf {
        self.root().join("before")
    }

    pub fn after_dir(&self) -> PathBuf {
        self.root().join("after")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("reports")
    }

    /// Write a CSV file at `relative` below `dir`, creating parent directories
    pub fn create_csv(&self, dir: &Path, relative: &str, data: &[Vec<&str>]) -> Result<PathBuf> {
        let mut content = String::new();
        for row in data {
            content.push_str(&row.join(","));
            content.push('\n');
        }
        self.create_raw(dir, relative, content.as_bytes())
    }

    pub fn create_raw(&self, dir: &Path, relative: &str, content: &[u8]) -> Result<PathBuf> {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write an `id / name / value` parquet file
    pub fn create_parquet(&self, dir: &Path, relative: &str, rows: &[(i64, Option<&str>, f64)]) -> Result<PathBuf> {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let schema = Arc::new(parse_message_type(
            "message schema {
                REQUIRED INT64 id;
                OPTIONAL BYTE_ARRAY name (UTF8);
                REQUIRED DOUBLE value;
            }",
        )?);
        let props = Arc::new(WriterProperties::builder().build());
        let file = fs::File::create(&path)?;
        let mut writer = SerializedFileWriter::new(file, schema, props)?;

        let ids: Vec<i64> = rows.iter().map(|r| r.0).collect();
        let names: Vec<ByteArray> = rows
            .iter()
            .filter_map(|r| r.1)
            .map(|n| ByteArray::from(n))
            .collect();
        let name_levels: Vec<i16> = rows.iter().map(|r| i16::from(r.1.is_some())).collect();
        let values: Vec<f64> = rows.iter().map(|r| r.2).collect();

        let mut row_group = writer.next_row_group()?;
        let mut index = 0;
        while let Some(mut column) = row_group.next_column()? {
            match index {
                0 => {
                    column.typed::<Int64Type>().write_batch(&ids, None, None)?;
                }
                1 => {
                    column
                        .typed::<ByteArrayType>()
                        .write_batch(&names, Some(&name_levels), None)?;
                }
                _ => {
                    column.typed::<DoubleType>().write_batch(&values, None, None)?;
                }
            }
            column.close()?;
            index += 1;
        }
        row_group.close()?;
        writer.close()?;
        Ok(path)
    }

    /// Configuration pointing at this fixture's directories
    pub fn config(&self, extensions: &[&str]) -> CompareConfig {
        CompareConfig {
            base_path_before: Some(self.before_dir()),
            base_path_after: Some(self.after_dir()),
            output_directory: Some(self.output_dir()),
            file_extensions: extensions.iter().map(|e| e.to_string()).collect(),
            ..CompareConfig::default()
        }
    }

    /// Write a YAML configuration file and return its path
    pub fn create_config_yaml(&self, content: &str) -> Result<PathBuf> {
        let path = self.root().join("config.yaml");
        fs::write(&path, content)?;
        Ok(path)
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Parse and execute a pqcompare command
    pub fn run_command(&self, args: &[&str]) -> Result<()> {
        use clap::Parser;
        use pqcompare::cli::Cli;
        use pqcompare::commands::execute_command;

        let mut cmd_args = vec!["pqcompare"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args)
            .map_err(|e| pqcompare::PqcompareError::invalid_input(e.to_string()))?;
        execute_command(cli.command)
    }

    pub fn expect_success(&self, args: &[&str]) {
        self.run_command(args).expect("Command should succeed");
    }

    pub fn expect_failure(&self, args: &[&str]) -> pqcompare::PqcompareError {
        self.run_command(args).expect_err("Command should fail")
    }
}

/// Build an in-memory dataset from column specs and rows
pub fn table(columns: &[(&str, LogicalType)], rows: Vec<Vec<Value>>) -> Dataset {
    Dataset::from_rows(
        columns
            .iter()
            .map(|(name, logical_type)| ColumnDescriptor::new(*name, *logical_type))
            .collect(),
        rows,
    )
    .expect("valid dataset")
}

pub fn int(v: i64) -> Value {
    Value::Integer(v)
}

pub fn float(v: f64) -> Value {
    Value::Float(v)
}

pub fn text(v: &str) -> Value {
    Value::String(v.to_string())
}

/// Sample data generators for testing
pub mod sample_data {
    use super::{float, int, table, text};
    use pqcompare::{Dataset, LogicalType, Value};

    /// `rows` products keyed by a unique integer id
    pub fn products(rows: usize) -> Vec<Vec<Value>> {
        (0..rows)
            .map(|i| {
                vec![
                    int(i as i64),
                    text(&format!("product-{}", i)),
                    float(i as f64 * 0.5 + 0.25),
                ]
            })
            .collect()
    }

    pub fn product_table(rows: Vec<Vec<Value>>) -> Dataset {
        table(
            &[
                ("id", LogicalType::Integer),
                ("name", LogicalType::String),
                ("price", LogicalType::Float),
            ],
            rows,
        )
    }

    /// Low-cardinality rows with a duplicate, so no key can be inferred
    pub fn unkeyed_sales() -> Vec<Vec<Value>> {
        vec![
            vec![text("Oslo"), text("apple"), int(3), float(1.5)],
            vec![text("Oslo"), text("apple"), int(3), float(1.5)],
            vec![text("Rome"), text("pear"), int(7), float(2.25)],
            vec![text("Lima"), text("plum"), int(11), float(4.0)],
            vec![text("Kyiv"), text("kiwi"), int(20), float(0.5)],
        ]
    }

    pub fn sales_table(rows: Vec<Vec<Value>>) -> Dataset {
        table(
            &[
                ("city", LogicalType::String),
                ("product", LogicalType::String),
                ("qty", LogicalType::Integer),
                ("price", LogicalType::Float),
            ],
            rows,
        )
    }
}
