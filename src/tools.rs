//! MCP Tools for PostgreSQL access.
//!
//! - `list-database-tables`: Table names of the configured schema
//! - `get-table-schema`: Column descriptors of one table
//! - `run-sql-query`: Run a SQL statement under the read-only policy
//! - `list-entity-names`: Names and ids of users, roles, sensors or hardware
//! - `query-database`: Answer a natural-language request with generated SQL
//!
//! Every tool is rate limited and returns a JSON payload. Failures are
//! returned as `ToolOutput::error` with `{error, kind, suggestion}` rather
//! than protocol errors.

mod inputs;

pub use inputs::*;

use crate::error::ServerError;
use crate::handlers;
use crate::server::{PgMcpServer, STDIO_CLIENT_ID};
use mcpkit::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

/// The `#[mcp_server]` macro generates the MCP protocol infrastructure
/// for the `#[tool]` annotated methods.
#[mcp_server(
    name = "pg-mcp-server",
    version = "0.1.0",
    instructions = "PostgreSQL database access - table listing, schema inspection, read-only SQL, and natural-language queries"
)]
impl PgMcpServer {
    /// List the tables of the configured schema.
    #[tool(
        name = "list-database-tables",
        description = "List the tables in the database. Optionally filter by a case-insensitive substring."
    )]
    pub async fn list_database_tables(
        &self,
        input: ListTablesInput,
    ) -> Result<ToolOutput, McpError> {
        self.respond("list-database-tables", handlers::list_database_tables(self, input))
            .await
    }

    /// Describe the columns of a table.
    #[tool(
        name = "get-table-schema",
        description = "Get the columns of a table: name, data type, nullability, primary key, default value."
    )]
    pub async fn get_table_schema(
        &self,
        input: GetTableSchemaInput,
    ) -> Result<ToolOutput, McpError> {
        self.respond("get-table-schema", handlers::get_table_schema(self, input))
            .await
    }

    /// Run a SQL statement.
    #[tool(
        name = "run-sql-query",
        description = "Run a SQL query and return the rows. Only SELECT and WITH statements are allowed unless the server enables DML."
    )]
    pub async fn run_sql_query(&self, input: RunSqlQueryInput) -> Result<ToolOutput, McpError> {
        self.respond("run-sql-query", handlers::run_sql_query(self, input))
            .await
    }

    /// List entity names for a category.
    #[tool(
        name = "list-entity-names",
        description = "List names and ids of users, roles, sensors or hardware, found in the tables that hold them."
    )]
    pub async fn list_entity_names(
        &self,
        input: ListEntityNamesInput,
    ) -> Result<ToolOutput, McpError> {
        self.respond("list-entity-names", handlers::list_entity_names(self, input))
            .await
    }

    /// Answer a natural-language request.
    #[tool(
        name = "query-database",
        description = "Ask the database a question in plain language, e.g. 'how many tables', 'list users', 'show data from orders'. Output type: text, graph or both."
    )]
    pub async fn query_database(
        &self,
        input: QueryDatabaseInput,
    ) -> Result<ToolOutput, McpError> {
        self.respond("query-database", handlers::query_database(self, input))
            .await
    }
}

impl PgMcpServer {
    /// Rate-limit the call, await the handler and render its payload.
    async fn respond<F>(&self, tool: &str, handler: F) -> Result<ToolOutput, McpError>
    where
        F: std::future::Future<Output = Result<Value, ServerError>>,
    {
        debug!("Tool call: {}", tool);

        if let Err(e) = self.rate_limiter.check(STDIO_CLIENT_ID) {
            warn!("Tool '{}' rate limited", tool);
            return Ok(ToolOutput::error(render_payload(&handlers::error_payload(&e))));
        }

        match handler.await {
            Ok(payload) => Ok(ToolOutput::text(render_payload(&payload))),
            Err(e) => {
                warn!("Tool '{}' failed: {}", tool, e);
                Ok(ToolOutput::error(render_payload(&handlers::error_payload(&e))))
            }
        }
    }
}

/// Pretty-print a payload for a text content block.
fn render_payload(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|e| {
        warn!("Failed to serialize tool payload: {}", e);
        format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_payload_is_json() {
        let text = render_payload(&json!({"tableCount": 1, "tableNames": ["orders"]}));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["tableNames"][0], "orders");
    }

    #[test]
    fn test_render_error_payload() {
        let text = render_payload(&handlers::error_payload(&ServerError::not_found(
            "No tables found for entity 'sensors'",
        )));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["kind"], "not_found");
        assert!(parsed["error"].as_str().unwrap().contains("sensors"));
    }
}
