//! SQL generation for routed requests.
//!
//! Output is a pure function of the inputs: the same table, columns, category
//! and limit always produce byte-identical SQL.

use crate::constants::FALLBACK_COLUMN_COUNT;
use crate::routing::EntityCategory;
use crate::security::quote_identifier;
use serde::Serialize;

/// A generated statement with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub sql: String,

    /// Table the statement reads, when it reads a single user table.
    pub source_table: Option<String>,

    /// Category the statement was built for, for entity lookups.
    pub category: Option<EntityCategory>,
}

impl QueryPlan {
    /// A plan over the catalog rather than a user table.
    pub fn catalog(sql: String) -> Self {
        Self {
            sql,
            source_table: None,
            category: None,
        }
    }

    /// A plan reading `table`.
    pub fn for_table(sql: String, table: &str) -> Self {
        Self {
            sql,
            source_table: Some(table.to_string()),
            category: None,
        }
    }
}

/// Builds statements with row limits bounded by configuration.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    default_limit: usize,
    max_limit: usize,
}

impl QueryBuilder {
    pub fn new(default_limit: usize, max_limit: usize) -> Self {
        Self {
            default_limit,
            max_limit: max_limit.max(1),
        }
    }

    /// The effective limit: the default when absent, clamped to `1..=max`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }

    /// Statement listing names (and ids when available) of a category's
    /// entities stored in `table`.
    ///
    /// `columns` are the table's real column names in ordinal order. The
    /// first preferred identifier and label columns present (compared
    /// case-insensitively) are selected; the real spelling is emitted.
    pub fn build_entity_query(
        &self,
        table: &str,
        columns: &[String],
        category: EntityCategory,
        limit: Option<usize>,
    ) -> QueryPlan {
        let limit = self.clamp_limit(limit);
        let quoted_table = quote_identifier(table);

        let sql = if columns.is_empty() {
            format!("SELECT * FROM {} LIMIT {}", quoted_table, limit)
        } else {
            let id = find_preferred(category.id_columns(), columns).map(quote_identifier);
            let label = find_preferred(category.label_columns(), columns).map(quote_identifier);

            match (id, label) {
                (Some(id), Some(label)) => format!(
                    "SELECT DISTINCT {id} AS id, {label} AS name FROM {quoted_table} \
                     WHERE {label} IS NOT NULL ORDER BY {label} LIMIT {limit}"
                ),
                (None, Some(label)) => format!(
                    "SELECT DISTINCT {label} AS name FROM {quoted_table} \
                     WHERE {label} IS NOT NULL ORDER BY {label} LIMIT {limit}"
                ),
                (Some(id), None) => {
                    format!("SELECT {id} AS id FROM {quoted_table} ORDER BY {id} LIMIT {limit}")
                }
                (None, None) => {
                    let selected: Vec<String> = columns
                        .iter()
                        .take(FALLBACK_COLUMN_COUNT)
                        .map(|c| quote_identifier(c))
                        .collect();
                    format!(
                        "SELECT {} FROM {} LIMIT {}",
                        selected.join(", "),
                        quoted_table,
                        limit
                    )
                }
            }
        };

        QueryPlan {
            sql,
            source_table: Some(table.to_string()),
            category: Some(category),
        }
    }

    /// `SELECT *` over `table` with a fixed limit.
    pub fn table_dump(&self, table: &str, limit: usize) -> QueryPlan {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(table),
            limit.clamp(1, self.max_limit)
        );
        QueryPlan::for_table(sql, table)
    }

    /// Row count of `table`.
    pub fn count_rows(&self, table: &str) -> QueryPlan {
        let sql = format!("SELECT COUNT(*) AS row_count FROM {}", quote_identifier(table));
        QueryPlan::for_table(sql, table)
    }
}

/// First preferred name that case-insensitively equals a real column,
/// returned in the column's real spelling.
fn find_preferred<'a>(preferred: &[&str], columns: &'a [String]) -> Option<&'a str> {
    preferred.iter().find_map(|want| {
        columns
            .iter()
            .find(|col| col.eq_ignore_ascii_case(want))
            .map(String::as_str)
    })
}
