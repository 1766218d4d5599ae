//! Query results and their renderings.

use crate::database::types::{SqlValue, TypeMapper};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;

/// A single row of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Column values indexed by column name.
    #[serde(flatten)]
    pub columns: HashMap<String, SqlValue>,
}

impl ResultRow {
    /// Create a new result row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// Get a textual value by column name.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Insert a value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.insert(column.into(), value);
    }
}

/// Result of a query execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in order.
    pub columns: Vec<ColumnInfo>,

    /// Result rows.
    pub rows: Vec<ResultRow>,

    /// Execution time in milliseconds.
    pub execution_time_ms: u64,

    /// Whether results were truncated due to row limit.
    pub truncated: bool,
}

/// Information about a result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// SQL type name.
    pub sql_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

impl QueryResult {
    /// Create an empty query result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from column names and rows of values in column order.
    pub fn from_values(columns: &[&str], values: Vec<Vec<SqlValue>>) -> Self {
        let rows = values
            .into_iter()
            .map(|vals| {
                let mut row = ResultRow::new();
                for (name, value) in columns.iter().zip(vals) {
                    row.insert(*name, value);
                }
                row
            })
            .collect();

        Self {
            columns: columns.iter().map(|c| ColumnInfo::new(*c, "TEXT")).collect(),
            rows,
            execution_time_ms: 0,
            truncated: false,
        }
    }

    /// Convert driver rows into a result.
    pub fn from_pg_rows(pg_rows: &[PgRow]) -> Self {
        let columns: Vec<ColumnInfo> = pg_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| {
                        ColumnInfo::new(sqlx::Column::name(col), TypeMapper::sql_type_name(col))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let rows = pg_rows
            .iter()
            .map(|pg_row| {
                let mut row = ResultRow::new();
                for (idx, col) in columns.iter().enumerate() {
                    row.insert(col.name.clone(), TypeMapper::extract_column(pg_row, idx));
                }
                row
            })
            .collect();

        Self {
            columns,
            rows,
            execution_time_ms: 0,
            truncated: false,
        }
    }

    /// Number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop rows beyond `max_rows`, marking the result as truncated.
    pub fn truncate(&mut self, max_rows: usize) {
        if self.rows.len() > max_rows {
            self.rows.truncate(max_rows);
            self.truncated = true;
        }
    }

    /// Rows as JSON objects.
    pub fn rows_json(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| serde_json::to_value(row).unwrap_or(Value::Null))
            .collect()
    }

    /// Format the result as a markdown table.
    pub fn to_markdown_table(&self) -> String {
        if self.columns.is_empty() {
            return "Query executed successfully. No results returned.".to_string();
        }

        let mut output = String::new();

        // Header row
        let headers: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        output.push_str("| ");
        output.push_str(&headers.join(" | "));
        output.push_str(" |\n");

        // Separator row
        output.push_str("| ");
        output.push_str(
            &headers
                .iter()
                .map(|h| "-".repeat(h.len().max(3)))
                .collect::<Vec<_>>()
                .join(" | "),
        );
        output.push_str(" |\n");

        // Data rows
        for row in &self.rows {
            output.push_str("| ");
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|col| {
                    row.get(&col.name)
                        .map(|v| v.to_display_string())
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect();
            output.push_str(&values.join(" | "));
            output.push_str(" |\n");
        }

        // Footer
        output.push_str(&format!("\n_{} row(s)_", self.rows.len()));
        if self.truncated {
            output.push_str(" _(truncated)_");
        }
        output.push_str(&format!(" _({} ms)_", self.execution_time_ms));

        output
    }

    /// Chart-ready series: the first non-numeric column supplies labels and
    /// every numeric column becomes a dataset.
    ///
    /// Returns `None` when the result has no numeric column to plot.
    pub fn to_chart(&self) -> Option<Value> {
        let first = self.rows.first()?;

        let is_numeric = |name: &str| first.get(name).and_then(SqlValue::as_f64).is_some();

        let numeric: Vec<&ColumnInfo> = self
            .columns
            .iter()
            .filter(|c| is_numeric(&c.name))
            .collect();
        if numeric.is_empty() {
            return None;
        }

        let label_col = self.columns.iter().find(|c| !is_numeric(&c.name));

        let labels: Vec<String> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| match label_col {
                Some(col) => row
                    .get(&col.name)
                    .map(|v| v.to_display_string())
                    .unwrap_or_default(),
                None => (i + 1).to_string(),
            })
            .collect();

        let datasets: Vec<Value> = numeric
            .iter()
            .map(|col| {
                let data: Vec<Value> = self
                    .rows
                    .iter()
                    .map(|row| {
                        row.get(&col.name)
                            .and_then(SqlValue::as_f64)
                            .map(Value::from)
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                json!({ "label": col.name, "data": data })
            })
            .collect();

        let chart_type = if labels.len() > 12 { "line" } else { "bar" };

        Some(json!({
            "type": chart_type,
            "labels": labels,
            "datasets": datasets,
        }))
    }
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
