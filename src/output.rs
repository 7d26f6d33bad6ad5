//! Output formatting: console tree summaries, HTML reports and JSON

use crate::change_detection::{ComparisonMethod, ComparisonStatus, DiffResult, RowRecord};
use crate::dataset::Value;
use crate::error::Result;
use crate::runner::RunSummary;
use crate::schema::SchemaDiff;
use chrono::Local;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Columns listed in the console impact summary
const CONSOLE_IMPACT_LIMIT: usize = 5;
/// Rows shown per table in console samples
const CONSOLE_SAMPLE_ROWS: usize = 3;
/// Rows rendered per table in HTML reports
const HTML_ROW_LIMIT: usize = 500;

/// Pretty printer for pqcompare output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print one comparison result as a tree
    pub fn print_result(label: &str, result: &DiffResult) {
        println!("{} {}", status_icon(result.status), label);
        println!("├─ Status: {}", result.status);
        println!("├─ Rows: {} before, {} after", result.rows_before, result.rows_after);

        if result.schema_diff.has_changes() {
            println!("├─ Schema: CHANGED");
            Self::print_schema_diff(&result.schema_diff, "│  ");
        } else {
            println!("├─ Schema: unchanged");
        }

        match result.method {
            ComparisonMethod::None => {}
            ComparisonMethod::Digest => println!("├─ Method: digest"),
            ComparisonMethod::Keyed => {
                let key = result
                    .key
                    .as_ref()
                    .map(|k| k.columns.join(", "))
                    .unwrap_or_default();
                println!("├─ Method: keyed on [{}]", key);
            }
            ComparisonMethod::Fuzzy => {
                let blocking = result
                    .fuzzy
                    .as_ref()
                    .and_then(|f| f.blocking_column.clone())
                    .unwrap_or_else(|| "none".to_string());
                println!("├─ Method: fuzzy (blocking: {})", blocking);
            }
        }

        if result.changes.tolerance_absorbed > 0 {
            println!("├─ Within tolerance: {} cells", result.changes.tolerance_absorbed);
        }

        if result.changes.is_empty() {
            println!("└─ Rows: no differences");
            return;
        }

        println!("├─ Added rows: {}", result.added().len());
        Self::print_record_sample(result.added(), "│  ");
        println!("├─ Deleted rows: {}", result.deleted().len());
        Self::print_record_sample(result.deleted(), "│  ");
        println!("├─ Modified rows: {}", result.modified().len());
        for (i, modification) in result.modified().iter().take(CONSOLE_SAMPLE_ROWS).enumerate() {
            let is_last = i + 1 == result.modified().len().min(CONSOLE_SAMPLE_ROWS);
            let marker = if is_last { "└─" } else { "├─" };
            let columns: Vec<&str> = modification.changes.keys().map(String::as_str).collect();
            println!("│  {} {}: {}", marker, modification.key, columns.join(", "));
        }

        let impact = result.column_impact();
        println!("└─ Most impacted columns:");
        for (i, column) in impact.iter().take(CONSOLE_IMPACT_LIMIT).enumerate() {
            let is_last = i + 1 == impact.len().min(CONSOLE_IMPACT_LIMIT);
            let marker = if is_last { "└─" } else { "├─" };
            println!("   {} {}: {} rows", marker, column.column, column.modified_rows);
        }
    }

    /// Print the totals of a directory run
    pub fn print_run_summary(summary: &RunSummary) {
        println!("📊 Run summary");
        println!("├─ Compared: {}", summary.compared());
        println!("├─ Skipped (already passed): {}", summary.skipped.len());
        for status in [
            ComparisonStatus::ChecksumMatch,
            ComparisonStatus::ToleranceMatch,
            ComparisonStatus::Identical,
            ComparisonStatus::DifferencesFound,
            ComparisonStatus::SchemaMismatch,
            ComparisonStatus::NoSortKey,
            ComparisonStatus::Error,
        ] {
            let count = summary.count(status);
            if count > 0 {
                println!("├─ {} {}: {}", status_icon(status), status, count);
            }
        }
        println!("├─ Reports written: {}", summary.reports().len());

        let unmatched = &summary.unmatched;
        if unmatched.is_empty() {
            println!("└─ Unmatched files: none");
            return;
        }
        println!("└─ Unmatched files:");
        for path in &unmatched.only_in_before {
            println!("   ├─ only in before: {}", path.display());
        }
        for path in &unmatched.only_in_after {
            println!("   ├─ only in after: {}", path.display());
        }
    }

    fn print_schema_diff(diff: &SchemaDiff, prefix: &str) {
        if !diff.added.is_empty() {
            let names: Vec<String> = diff
                .added
                .iter()
                .map(|c| format!("{} ({})", c.name, c.logical_type))
                .collect();
            println!("{}├─ Columns added: {}", prefix, names.join(", "));
        }
        if !diff.removed.is_empty() {
            let names: Vec<String> = diff
                .removed
                .iter()
                .map(|c| format!("{} ({})", c.name, c.logical_type))
                .collect();
            println!("{}├─ Columns removed: {}", prefix, names.join(", "));
        }
        if !diff.type_changed.is_empty() {
            println!("{}└─ Type changes: {}", prefix, diff.type_changed.len());
            for change in &diff.type_changed {
                println!("{}   └─ {}: {} → {}", prefix, change.column, change.from, change.to);
            }
        }
    }

    fn print_record_sample(records: &[RowRecord], prefix: &str) {
        if records.is_empty() {
            return;
        }
        let sample: Vec<String> = records
            .iter()
            .take(CONSOLE_SAMPLE_ROWS)
            .map(|r| r.key.clone().unwrap_or_else(|| format!("row {}", r.row_index)))
            .collect();
        println!(
            "{}└─ {}{}",
            prefix,
            sample.join(", "),
            if records.len() > CONSOLE_SAMPLE_ROWS { ", ..." } else { "" }
        );
    }
}

fn status_icon(status: ComparisonStatus) -> &'static str {
    match status {
        ComparisonStatus::ChecksumMatch | ComparisonStatus::ToleranceMatch | ComparisonStatus::Identical => "✅",
        ComparisonStatus::DifferencesFound => "🟡",
        ComparisonStatus::SchemaMismatch | ComparisonStatus::NoSortKey | ComparisonStatus::Error => "❌",
    }
}

/// HTML report writer
pub struct HtmlReport;

impl HtmlReport {
    /// Write `report_<stem>_<timestamp>.html` into `output_dir`
    pub fn write(result: &DiffResult, before: &Path, after: &Path, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let stem = before
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let file_name = format!("report_{}_{}.html", stem, Local::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = output_dir.join(file_name);

        fs::write(&path, Self::render(result, before, after))?;
        log::info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Render a complete HTML document
    pub fn render(result: &DiffResult, before: &Path, after: &Path) -> String {
        let mut html = String::new();
        let title = format!("Comparison report: {}", before.display());

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n",
            escape(&title),
            STYLE
        );
        let _ = writeln!(html, "<h1>{}</h1>", escape(&title));

        let _ = writeln!(html, "<h2>Summary</h2>\n<table>");
        summary_row(&mut html, "Before", &before.display().to_string());
        summary_row(&mut html, "After", &after.display().to_string());
        summary_row(&mut html, "Status", result.status.as_str());
        summary_row(&mut html, "Rows before", &result.rows_before.to_string());
        summary_row(&mut html, "Rows after", &result.rows_after.to_string());
        if let Some(key) = &result.key {
            summary_row(&mut html, "Key", &key.columns.join(", "));
        }
        if let Some(fuzzy) = &result.fuzzy {
            summary_row(&mut html, "Fuzzy threshold", &fuzzy.threshold.to_string());
            if let Some(column) = &fuzzy.blocking_column {
                summary_row(&mut html, "Blocking column", column);
            }
        }
        summary_row(&mut html, "Added rows", &result.added().len().to_string());
        summary_row(&mut html, "Deleted rows", &result.deleted().len().to_string());
        summary_row(&mut html, "Modified rows", &result.modified().len().to_string());
        summary_row(
            &mut html,
            "Cells within tolerance",
            &result.changes.tolerance_absorbed.to_string(),
        );
        let _ = writeln!(html, "</table>");

        render_schema(&mut html, &result.schema_diff);

        let impact = result.column_impact();
        if !impact.is_empty() {
            let _ = writeln!(html, "<h2>Column Impact Summary</h2>\n<table>\n<tr><th>Column</th><th>Modified rows</th></tr>");
            for column in &impact {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape(&column.column),
                    column.modified_rows
                );
            }
            let _ = writeln!(html, "</table>");
        }

        render_records(&mut html, "Added rows", result.added());
        render_records(&mut html, "Deleted rows", result.deleted());

        if !result.modified().is_empty() {
            let _ = writeln!(
                html,
                "<h2>Modified rows ({})</h2>\n<table>\n<tr><th>Key</th><th>Column</th><th>Before</th><th>After</th></tr>",
                result.modified().len()
            );
            for modification in result.modified().iter().take(HTML_ROW_LIMIT) {
                for (column, change) in &modification.changes {
                    let _ = writeln!(
                        html,
                        "<tr><td>{}</td><td>{}</td><td class=\"before\">{}</td><td class=\"after\">{}</td></tr>",
                        escape(&modification.key.to_string()),
                        escape(column),
                        escape(&display(&change.before)),
                        escape(&display(&change.after))
                    );
                }
            }
            let _ = writeln!(html, "</table>");
            truncated_note(&mut html, result.modified().len());
        }

        let _ = writeln!(html, "</body>\n</html>");
        html
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}th{background:#f0f0f0}\
.before{background:#fdecea}.after{background:#e8f5e9}";

fn summary_row(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", escape(label), escape(value));
}

fn render_schema(html: &mut String, diff: &SchemaDiff) {
    let _ = writeln!(html, "<h2>Schema differences</h2>");
    if !diff.has_changes() {
        let _ = writeln!(html, "<p>No schema differences.</p>");
        return;
    }
    let _ = writeln!(html, "<table>\n<tr><th>Change</th><th>Column</th><th>Detail</th></tr>");
    for column in &diff.added {
        let _ = writeln!(
            html,
            "<tr><td>added</td><td>{}</td><td>{}</td></tr>",
            escape(&column.name),
            column.logical_type
        );
    }
    for column in &diff.removed {
        let _ = writeln!(
            html,
            "<tr><td>removed</td><td>{}</td><td>{}</td></tr>",
            escape(&column.name),
            column.logical_type
        );
    }
    for change in &diff.type_changed {
        let _ = writeln!(
            html,
            "<tr><td>type changed</td><td>{}</td><td>{} → {}</td></tr>",
            escape(&change.column),
            change.from,
            change.to
        );
    }
    let _ = writeln!(html, "</table>");
}

fn render_records(html: &mut String, title: &str, records: &[RowRecord]) {
    if records.is_empty() {
        return;
    }
    let _ = writeln!(html, "<h2>{} ({})</h2>\n<table>", escape(title), records.len());

    let columns: Vec<&String> = records[0].data.keys().collect();
    let _ = write!(html, "<tr><th>Row</th><th>Key</th>");
    for column in &columns {
        let _ = write!(html, "<th>{}</th>", escape(column));
    }
    let _ = writeln!(html, "</tr>");

    for record in records.iter().take(HTML_ROW_LIMIT) {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td>",
            record.row_index,
            escape(record.key.as_deref().unwrap_or(""))
        );
        for value in record.data.values() {
            let _ = write!(html, "<td>{}</td>", escape(&display(value)));
        }
        let _ = writeln!(html, "</tr>");
    }
    let _ = writeln!(html, "</table>");
    truncated_note(html, records.len());
}

fn truncated_note(html: &mut String, total: usize) {
    if total > HTML_ROW_LIMIT {
        let _ = writeln!(
            html,
            "<p>Showing the first {} of {} rows.</p>",
            HTML_ROW_LIMIT, total
        );
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "∅".to_string(),
        other => other.to_string(),
    }
}

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format a comparison result together with its column impact summary
    pub fn format_result(result: &DiffResult) -> Result<String> {
        let json = serde_json::json!({
            "result": result,
            "column_impact": result.column_impact(),
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
