//! Result rendering for BIQL queries.
//!
//! Four tabular formats plus a path listing:
//!
//! - **json** via [`to_json()`] / [`to_json_pretty()`] - row keys stay in
//!   projection order, nested map keys are sorted for deterministic output
//! - **table** - monospaced columns with a header row
//! - **csv / tsv** - standard quoting through the `csv` crate; list and map
//!   cells are embedded as JSON strings
//! - **paths** - one file path per row
//!
//! # Examples
//!
//! ```
//! use biql::output::to_json;
//! use biql::{Row, Value};
//!
//! let mut row = Row::new();
//! row.insert("sub".to_string(), Value::Str("01".to_string()));
//! row.insert("count".to_string(), Value::Int(12));
//!
//! assert_eq!(to_json(&[row]), r#"[{"sub":"01","count":12}]"#);
//! ```

use crate::ast::OutputFormat;
use crate::evaluator::Row;
use crate::value::Value;

/// Rendering or stream-writing failure, fatal to the run.
#[derive(Debug)]
pub enum OutputError {
    Csv(csv::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Csv(e) => write!(f, "csv output failed: {}", e),
            OutputError::Io(e) => write!(f, "writing output failed: {}", e),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Csv(e) => Some(e),
            OutputError::Io(e) => Some(e),
        }
    }
}

impl From<csv::Error> for OutputError {
    fn from(e: csv::Error) -> Self {
        OutputError::Csv(e)
    }
}

impl From<std::io::Error> for OutputError {
    fn from(e: std::io::Error) -> Self {
        OutputError::Io(e)
    }
}

/// Render rows in the requested format.
pub fn format_rows(rows: &[Row], format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => Ok(to_json_pretty(rows)),
        OutputFormat::Table => Ok(to_table(rows)),
        OutputFormat::Csv => to_delimited(rows, b','),
        OutputFormat::Tsv => to_delimited(rows, b'\t'),
        OutputFormat::Paths => Ok(to_paths(rows)),
    }
}

// ========================================
// JSON
// ========================================

struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    fn print_rows(&self, rows: &[Row]) -> String {
        if rows.is_empty() {
            return "[]".to_string();
        }
        if self.pretty {
            let items: Vec<String> = rows
                .iter()
                .map(|row| format!("{}{}", self.indent(1), self.print_row(row, 1)))
                .collect();
            format!("[\n{}\n]", items.join(",\n"))
        } else {
            let items: Vec<String> = rows.iter().map(|row| self.print_row(row, 0)).collect();
            format!("[{}]", items.join(","))
        }
    }

    /// Row keys keep their projection order.
    fn print_row(&self, row: &Row, indent: usize) -> String {
        if row.is_empty() {
            return "{}".to_string();
        }
        let items: Vec<String> = row
            .iter()
            .map(|(key, value)| {
                if self.pretty {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        escape_string(key),
                        self.print_value(value, indent + 1)
                    )
                } else {
                    format!(
                        "\"{}\":{}",
                        escape_string(key),
                        self.print_value(value, indent)
                    )
                }
            })
            .collect();
        if self.pretty {
            format!(
                "{{\n{}\n{}}}",
                items.join(",\n"),
                self.indent(indent)
            )
        } else {
            format!("{{{}}}", items.join(","))
        }
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => {
                if n.is_finite() {
                    // Keep floats recognizably floats
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                } else {
                    "null".to_string()
                }
            }
            Value::Str(s) => format!("\"{}\"", escape_string(s)),
            Value::List(items) => self.print_list(items, indent),
            Value::Map(map) => self.print_map(map, indent),
        }
    }

    fn print_list(&self, items: &[Value], indent: usize) -> String {
        if items.is_empty() {
            return "[]".to_string();
        }
        if self.pretty {
            let parts: Vec<String> = items
                .iter()
                .map(|v| {
                    format!(
                        "{}{}",
                        self.indent(indent + 1),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            format!(
                "[\n{}\n{}]",
                parts.join(",\n"),
                self.indent(indent)
            )
        } else {
            let parts: Vec<String> = items.iter().map(|v| self.print_value(v, indent)).collect();
            format!("[{}]", parts.join(","))
        }
    }

    /// Nested map keys are sorted for deterministic output.
    fn print_map(
        &self,
        map: &std::collections::HashMap<String, Value>,
        indent: usize,
    ) -> String {
        if map.is_empty() {
            return "{}".to_string();
        }
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();

        if self.pretty {
            let parts: Vec<String> = keys
                .iter()
                .map(|k| {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        escape_string(k),
                        self.print_value(&map[*k], indent + 1)
                    )
                })
                .collect();
            format!(
                "{{\n{}\n{}}}",
                parts.join(",\n"),
                self.indent(indent)
            )
        } else {
            let parts: Vec<String> = keys
                .iter()
                .map(|k| format!("\"{}\":{}", escape_string(k), self.print_value(&map[*k], indent)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }
}

fn escape_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\r' => vec!['\\', 'r'],
            '\t' => vec!['\\', 't'],
            c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
            c => vec![c],
        })
        .collect()
}

/// Compact JSON.
pub fn to_json(rows: &[Row]) -> String {
    JsonPrinter::new(false).print_rows(rows)
}

/// Pretty JSON with 2-space indentation.
pub fn to_json_pretty(rows: &[Row]) -> String {
    JsonPrinter::new(true).print_rows(rows)
}

/// Compact JSON for a single value, used for embedding cells in csv/tsv.
pub fn value_to_json(value: &Value) -> String {
    JsonPrinter::new(false).print_value(value, 0)
}

// ========================================
// Table
// ========================================

/// List cells wider than this render as a count placeholder.
const MAX_TABLE_CELL: usize = 40;

fn table_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Str(s) => s.clone(),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.to_display_string(),
        Value::List(items) => {
            let rendered = value_to_json(value);
            if rendered.len() > MAX_TABLE_CELL {
                format!("[...{} items...]", items.len())
            } else {
                rendered
            }
        }
        Value::Map(_) => value_to_json(value),
    }
}

/// Union of row keys in first-seen order.
fn column_names(rows: &[Row]) -> Vec<String> {
    let mut columns = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

pub fn to_table(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No results found".to_string();
    }

    let columns = column_names(rows);
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let cell = row.get(column).map(table_cell).unwrap_or_default();
                    widths[i] = widths[i].max(cell.len());
                    cell
                })
                .collect()
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | "),
    );
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-|-"),
    );
    for row in cells {
        lines.push(
            row.iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }
    lines.join("\n")
}

// ========================================
// CSV / TSV
// ========================================

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Str(s) => s.clone(),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.to_display_string(),
        // Structured cells are embedded as JSON text; the writer quotes them
        Value::List(_) | Value::Map(_) => value_to_json(value),
    }
}

fn to_delimited(rows: &[Row], delimiter: u8) -> Result<String, OutputError> {
    if rows.is_empty() {
        return Ok(String::new());
    }

    let columns = column_names(rows);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| OutputError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| {
        OutputError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

// ========================================
// Paths
// ========================================

/// One path per row: `filepath` when present, `relative_path` otherwise.
pub fn to_paths(rows: &[Row]) -> String {
    let mut lines = Vec::new();
    for row in rows {
        let path = match row.get("filepath") {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => match row.get("relative_path") {
                Some(Value::Str(s)) => Some(s.clone()),
                _ => None,
            },
        };
        if let Some(path) = path {
            lines.push(path);
        }
    }
    lines.join("\n")
}
