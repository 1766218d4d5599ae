//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendering requested from `query-database`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Rows plus a markdown table (default).
    #[default]
    Text,
    /// Rows plus chart-ready series.
    Graph,
    /// Both renderings.
    Both,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Text => "text",
            OutputType::Graph => "graph",
            OutputType::Both => "both",
        }
    }

    pub fn wants_text(&self) -> bool {
        matches!(self, OutputType::Text | OutputType::Both)
    }

    pub fn wants_graph(&self) -> bool {
        matches!(self, OutputType::Graph | OutputType::Both)
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = InvalidOutputTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(OutputType::Text),
            "graph" | "chart" => Ok(OutputType::Graph),
            "both" => Ok(OutputType::Both),
            _ => Err(InvalidOutputTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid output type string.
#[derive(Debug, Clone)]
pub struct InvalidOutputTypeError(String);

impl fmt::Display for InvalidOutputTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid output type '{}'. Valid types: text, graph, both",
            self.0
        )
    }
}

impl std::error::Error for InvalidOutputTypeError {}

/// Input for the `list-database-tables` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Optional filter; only tables whose name contains it are listed.
    #[serde(default)]
    #[schemars(description = "Optional case-insensitive substring to filter table names")]
    pub query: Option<String>,
}

/// Input for the `get-table-schema` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetTableSchemaInput {
    /// Table name.
    #[serde(default)]
    #[schemars(description = "Table name (case-insensitive)")]
    pub table: Option<String>,

    /// Free-text request naming a table, used when `table` is absent.
    #[serde(default)]
    #[schemars(description = "Free-text request naming the table, e.g. 'schema of table orders'")]
    pub query: Option<String>,
}

/// Input for the `run-sql-query` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunSqlQueryInput {
    /// The SQL statement.
    #[schemars(description = "SQL statement to run (SELECT or WITH unless DML is enabled)")]
    pub sql: String,

    /// Maximum number of rows to return.
    #[serde(default)]
    #[schemars(description = "Maximum number of rows to return (default: server configured limit)")]
    pub limit: Option<usize>,
}

/// Input for the `list-entity-names` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListEntityNamesInput {
    /// Request naming an entity category.
    #[schemars(description = "Request naming an entity: users, roles, sensors or hardware")]
    pub query: String,

    /// Maximum number of names to return.
    #[serde(default = "default_entity_limit")]
    #[schemars(description = "Maximum number of names to return (default: 100)")]
    pub limit: usize,
}

fn default_entity_limit() -> usize {
    crate::constants::DEFAULT_ROW_LIMIT
}

/// Input for the `query-database` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryDatabaseInput {
    /// Natural-language request.
    #[schemars(description = "Natural-language request, e.g. 'how many tables' or 'list users'")]
    pub query: String,

    /// Rendering to include with the rows.
    #[serde(default)]
    #[schemars(description = "Output type: 'text' (markdown), 'graph' (chart series), or 'both' (default: text)")]
    pub output_type: OutputType,
}

/// Expose the derived `JsonSchema` as the `tool_input_schema()` hook the
/// `#[mcp_server]` macro calls for custom parameter types.
macro_rules! impl_tool_input_schema {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Generate JSON Schema for this type.
                pub fn tool_input_schema() -> serde_json::Value {
                    serde_json::to_value(schemars::schema_for!($ty))
                        .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
                }
            }
        )*
    };
}

impl_tool_input_schema!(
    ListTablesInput,
    GetTableSchemaInput,
    RunSqlQueryInput,
    ListEntityNamesInput,
    QueryDatabaseInput,
);
