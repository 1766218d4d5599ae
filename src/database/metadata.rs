//! PostgreSQL catalog queries for schema introspection.
//!
//! Catalog identifiers are cast to `text` so every driver sees plain strings
//! instead of the `sql_identifier` / `yes_or_no` domains.

use crate::database::{QueryResult, ResultRow};
use crate::security::quote_literal;
use serde::{Deserialize, Serialize};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_generated: bool,
    pub default_value: Option<String>,
}

impl ColumnDescriptor {
    /// A nullable, non-key column of the given type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            is_generated: false,
            default_value: None,
        }
    }

    /// Mark this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Statement listing base tables of `schema`, ordered by name.
pub fn list_tables_sql(schema: &str) -> String {
    format!(
        "SELECT table_name::text AS table_name \
         FROM information_schema.tables \
         WHERE table_schema = {} AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
        quote_literal(schema)
    )
}

/// Statement counting base tables of `schema`.
pub fn count_tables_sql(schema: &str) -> String {
    format!(
        "SELECT COUNT(*) AS table_count \
         FROM information_schema.tables \
         WHERE table_schema = {} AND table_type = 'BASE TABLE'",
        quote_literal(schema)
    )
}

/// Statement describing the columns of one table, or of the whole schema when
/// `table` is `None`.
pub fn describe_columns_sql(schema: &str, table: Option<&str>) -> String {
    let table_filter = table
        .map(|t| format!(" AND c.table_name = {}", quote_literal(t)))
        .unwrap_or_default();

    format!(
        "SELECT c.table_name::text AS table_name, \
                c.column_name::text AS column_name, \
                c.data_type::text AS data_type, \
                c.is_nullable::text AS is_nullable, \
                c.column_default::text AS column_default, \
                c.is_generated::text AS is_generated, \
                c.is_identity::text AS is_identity, \
                EXISTS ( \
                    SELECT 1 FROM information_schema.table_constraints tc \
                    JOIN information_schema.key_column_usage kcu \
                      ON tc.constraint_name = kcu.constraint_name \
                     AND tc.table_schema = kcu.table_schema \
                     AND tc.table_name = kcu.table_name \
                    WHERE tc.constraint_type = 'PRIMARY KEY' \
                      AND tc.table_schema = c.table_schema \
                      AND tc.table_name = c.table_name \
                      AND kcu.column_name = c.column_name \
                ) AS is_primary_key \
         FROM information_schema.columns c \
         WHERE c.table_schema = {}{} \
         ORDER BY c.table_name, c.ordinal_position",
        quote_literal(schema),
        table_filter
    )
}

/// Extract table names from a [`list_tables_sql`] result.
pub fn parse_table_names(result: &QueryResult) -> Vec<String> {
    result
        .rows
        .iter()
        .filter_map(|row| row.get_str("table_name").map(str::to_string))
        .collect()
}

/// Extract column descriptors from a [`describe_columns_sql`] result.
pub fn parse_columns(result: &QueryResult) -> Vec<ColumnDescriptor> {
    result.rows.iter().filter_map(parse_column).collect()
}

/// Extract one column descriptor from a [`describe_columns_sql`] row.
fn parse_column(row: &ResultRow) -> Option<ColumnDescriptor> {
    let name = row.get_str("column_name")?.to_string();
    let flag = |col: &str| row.get(col).and_then(|v| v.as_bool());

    Some(ColumnDescriptor {
        name,
        data_type: row.get_str("data_type").unwrap_or("unknown").to_string(),
        nullable: flag("is_nullable").unwrap_or(true),
        is_primary_key: flag("is_primary_key").unwrap_or(false),
        is_generated: row.get_str("is_generated") == Some("ALWAYS")
            || flag("is_identity").unwrap_or(false),
        default_value: row.get_str("column_default").map(str::to_string),
    })
}
