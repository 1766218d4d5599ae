//! Tool handlers, independent of the MCP transport.
//!
//! Each handler takes the server and a tool input and returns the JSON
//! payload the tool renders, or a [`ServerError`] the tool turns into an
//! error payload.

use crate::constants::LOG_SQL_MAX_LEN;
use crate::database::QueryResult;
use crate::error::ServerError;
use crate::routing::{ParsedRequest, RouteOutcome};
use crate::security::{parse_qualified_name, validate_identifier, ValidationResult};
use crate::server::PgMcpServer;
use crate::tools::{
    GetTableSchemaInput, ListEntityNamesInput, ListTablesInput, OutputType, QueryDatabaseInput,
    RunSqlQueryInput,
};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Names of the tables in the configured schema.
pub async fn list_database_tables(
    server: &PgMcpServer,
    input: ListTablesInput,
) -> Result<Value, ServerError> {
    let read = server.db.get_schema_snapshot().await?;

    let filter = input
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let names: Vec<&str> = read
        .snapshot
        .tables
        .iter()
        .map(String::as_str)
        .filter(|t| match &filter {
            Some(f) => t.to_lowercase().contains(f.as_str()),
            None => true,
        })
        .collect();

    let mut payload = json!({
        "tableCount": names.len(),
        "tableNames": names,
    });
    if let Some(warning) = read.warning {
        payload["warning"] = json!(warning);
    }
    Ok(payload)
}

/// Column descriptors of one table.
///
/// The table comes from `input.table`, or is read out of `input.query`
/// ("schema of orders", "columns for table users").
pub async fn get_table_schema(
    server: &PgMcpServer,
    input: GetTableSchemaInput,
) -> Result<Value, ServerError> {
    let read = server.db.get_schema_snapshot().await?;
    let snapshot = &read.snapshot;

    let requested = match (&input.table, &input.query) {
        (Some(table), _) if !table.trim().is_empty() => table.trim().to_string(),
        (_, Some(query)) if !query.trim().is_empty() => {
            let request = ParsedRequest::parse(query);
            request
                .word_after(&["table", "of", "for"])
                .map(str::to_string)
                .or_else(|| request.table_mention(snapshot).map(str::to_string))
                .ok_or_else(|| {
                    ServerError::invalid_input(format!("No table name found in '{}'", query))
                })?
        }
        _ => return Err(ServerError::invalid_input("Provide a table name or a query")),
    };

    let (schema, name) = parse_qualified_name(&requested);
    if let Some(schema) = schema {
        if !schema.eq_ignore_ascii_case(server.db.schema()) {
            return Err(ServerError::not_found(format!(
                "Schema '{}' is not exposed (configured schema: '{}')",
                schema,
                server.db.schema()
            )));
        }
    }
    validate_identifier(name)?;

    let table = snapshot.find_table(name).ok_or_else(|| {
        ServerError::not_found(format!(
            "Table '{}' does not exist in schema '{}'",
            requested,
            server.db.schema()
        ))
    })?;

    let columns = server
        .db
        .get_table_columns(table, server.db.default_timeout())
        .await?
        .ok_or_else(|| ServerError::not_found(format!("Table '{}' has no columns", table)))?;

    serde_json::to_value(columns).map_err(|e| ServerError::internal(e.to_string()))
}

/// Run a caller-supplied statement under the configured policy.
///
/// Reads are capped at the effective limit by wrapping them in an outer
/// `SELECT ... LIMIT`; one extra row is fetched to detect truncation.
/// Rejected statements never reach the store.
pub async fn run_sql_query(
    server: &PgMcpServer,
    input: RunSqlQueryInput,
) -> Result<Value, ServerError> {
    let ValidationResult { query_type } = server.validator.validate(&input.sql)?;
    let limit = server.router.builder().clamp_limit(input.limit);

    debug!(
        "Running {:?} statement: {}",
        query_type,
        crate::database::truncate_for_log(&input.sql, LOG_SQL_MAX_LEN)
    );

    let result = if query_type.is_read() {
        let mut result = server.db.execute(&limit_statement(&input.sql, limit)).await?;
        result.truncate(limit);
        result
    } else {
        info!("Executing {:?} statement", query_type);
        server.db.execute(&input.sql).await?
    };

    Ok(json!({
        "rowCount": result.row_count(),
        "truncated": result.truncated,
        "rows": result.rows_json(),
    }))
}

/// Wrap a read statement so at most `limit + 1` rows come back.
pub fn limit_statement(sql: &str, limit: usize) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT * FROM (\n{}\n) AS limited_query LIMIT {}",
        inner,
        limit.saturating_add(1)
    )
}

/// Names and ids of the entity category named in the request.
pub async fn list_entity_names(
    server: &PgMcpServer,
    input: ListEntityNamesInput,
) -> Result<Value, ServerError> {
    let found = server
        .router
        .lookup_entities(&input.query, Some(input.limit))
        .await?;

    Ok(json!({
        "entity": found.category.name(),
        "table": found.plan.source_table,
        "sql": found.plan.sql,
        "results": found.result.rows_json(),
    }))
}

/// Answer a natural-language request.
pub async fn query_database(
    server: &PgMcpServer,
    input: QueryDatabaseInput,
) -> Result<Value, ServerError> {
    let routed = server.router.route(&input.query).await?;

    let mut payload = json!({
        "query": input.query,
        "intent": routed.intent.kind(),
        "sql": routed.sql(),
    });

    match &routed.outcome {
        RouteOutcome::Executed { plan, result } => {
            payload["table"] = json!(plan.source_table);
            payload["rowCount"] = json!(result.row_count());
            payload["data"] = Value::Array(result.rows_json());
            render(&mut payload, result, input.output_type);
        }
        RouteOutcome::Delegated(answer) => {
            payload["data"] = json!(answer.result_text);
        }
        RouteOutcome::Diagnostic(message) => {
            payload["data"] = Value::Null;
            payload["message"] = json!(message);
        }
    }

    if let Some(warning) = routed.warning {
        payload["warning"] = json!(warning);
    }
    Ok(payload)
}

fn render(payload: &mut Value, result: &QueryResult, output_type: OutputType) {
    if output_type.wants_text() {
        payload["markdown"] = json!(result.to_markdown_table());
    }
    if output_type.wants_graph() {
        payload["chart"] = result.to_chart().unwrap_or(Value::Null);
    }
}

/// Error payload returned by every tool on failure.
pub fn error_payload(error: &ServerError) -> Value {
    let mut payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    if let Some(suggestion) = error.suggestion() {
        payload["suggestion"] = json!(suggestion);
    }
    if let ServerError::RateLimited {
        retry_after_seconds,
    } = error
    {
        payload["retryAfterSeconds"] = json!(retry_after_seconds);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, Config, DatabaseConfig, QueryConfig, RateLimitConfig};
    use crate::database::scripted::{ScriptedConnector, ScriptedStore};
    use crate::database::{ColumnDescriptor, SqlValue};
    use std::sync::Arc;

    fn server_with(store: ScriptedStore, allow_dml: bool) -> (PgMcpServer, Arc<ScriptedStore>) {
        let store = Arc::new(store);
        let connector = Arc::new(ScriptedConnector::new(Arc::clone(&store)));
        let config = Config {
            database: DatabaseConfig::default(),
            query: QueryConfig {
                allow_dml,
                ..QueryConfig::default()
            },
            rate_limit: RateLimitConfig::default(),
            agent: AgentConfig::default(),
        };
        (PgMcpServer::with_parts(config, connector, None), store)
    }

    fn shop() -> ScriptedStore {
        ScriptedStore::new()
            .with_table(
                "app_users",
                vec![
                    ColumnDescriptor::new("user_id", "integer").primary_key(),
                    ColumnDescriptor::new("username", "text"),
                ],
            )
            .with_table(
                "orders",
                vec![
                    ColumnDescriptor::new("id", "integer").primary_key(),
                    ColumnDescriptor::new("total", "numeric"),
                ],
            )
    }

    #[test]
    fn test_limit_statement() {
        assert_eq!(
            limit_statement("SELECT * FROM orders;  ", 10),
            "SELECT * FROM (\nSELECT * FROM orders\n) AS limited_query LIMIT 11"
        );
    }

    #[tokio::test]
    async fn test_list_tables_with_filter() {
        let (server, _) = server_with(shop(), false);

        let all = list_database_tables(&server, ListTablesInput::default())
            .await
            .unwrap();
        assert_eq!(all["tableCount"], 2);

        let filtered = list_database_tables(
            &server,
            ListTablesInput {
                query: Some("ORD".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(filtered["tableNames"], json!(["orders"]));
        assert!(filtered.get("warning").is_none());
    }

    #[tokio::test]
    async fn test_table_schema_from_query() {
        let (server, _) = server_with(shop(), false);

        let columns = get_table_schema(
            &server,
            GetTableSchemaInput {
                table: None,
                query: Some("schema of table ORDERS".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(columns[0]["name"], "id");
        assert_eq!(columns[0]["isPrimaryKey"], true);
        assert_eq!(columns[1]["dataType"], "numeric");
    }

    #[tokio::test]
    async fn test_table_schema_unknown_table() {
        let (server, _) = server_with(shop(), false);

        let err = get_table_schema(
            &server,
            GetTableSchemaInput {
                table: Some("invoices".to_string()),
                query: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        let err = get_table_schema(&server, GetTableSchemaInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_table_schema_qualified_name() {
        let (server, _) = server_with(shop(), false);

        let columns = get_table_schema(
            &server,
            GetTableSchemaInput {
                table: Some("public.app_users".to_string()),
                query: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(columns[1]["name"], "username");

        let err = get_table_schema(
            &server,
            GetTableSchemaInput {
                table: Some("audit.app_users".to_string()),
                query: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_run_sql_rejects_delete_without_store_access() {
        let (server, store) = server_with(shop(), false);

        let err = run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "DELETE FROM orders".to_string(),
                limit: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServerError::PolicyRejected(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_sql_truncates() {
        let wrapped = limit_statement("SELECT total FROM orders", 2);
        let result = QueryResult::from_values(
            &["total"],
            vec![
                vec![SqlValue::I64(1)],
                vec![SqlValue::I64(2)],
                vec![SqlValue::I64(3)],
            ],
        );
        let (server, store) = server_with(shop().with_response(&wrapped, result), false);

        let payload = run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "SELECT total FROM orders".to_string(),
                limit: Some(2),
            },
        )
        .await
        .unwrap();

        assert_eq!(payload["rowCount"], 2);
        assert_eq!(payload["truncated"], true);
        assert_eq!(store.executed(), vec![wrapped]);
    }

    #[tokio::test]
    async fn test_run_sql_dml_runs_unwrapped_when_allowed() {
        let (server, store) = server_with(shop(), true);

        run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "UPDATE orders SET total = 0".to_string(),
                limit: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(store.executed(), vec!["UPDATE orders SET total = 0".to_string()]);
    }

    #[tokio::test]
    async fn test_query_database_renders_markdown_and_chart() {
        let (server, _) = server_with(shop(), false);

        let payload = query_database(
            &server,
            QueryDatabaseInput {
                query: "how many tables".to_string(),
                output_type: OutputType::Both,
            },
        )
        .await
        .unwrap();

        assert_eq!(payload["intent"], "count");
        assert!(payload["sql"].as_str().unwrap().contains("COUNT(*)"));
        assert!(payload["markdown"].as_str().is_some());
        assert!(payload["chart"].is_object());
    }

    #[tokio::test]
    async fn test_query_database_without_delegate() {
        let (server, store) = server_with(shop(), false);

        let payload = query_database(
            &server,
            QueryDatabaseInput {
                query: "join orders with users".to_string(),
                output_type: OutputType::Text,
            },
        )
        .await
        .unwrap();

        assert_eq!(payload["intent"], "complex");
        assert!(payload["data"].is_null());
        assert!(payload["message"].as_str().unwrap().contains("AGENT_URL"));
        assert!(store
            .executed()
            .iter()
            .all(|sql| sql.contains("information_schema")));
    }

    #[test]
    fn test_error_payload() {
        let payload = error_payload(&ServerError::RateLimited {
            retry_after_seconds: 12,
        });
        assert_eq!(payload["kind"], "rate_limited");
        assert_eq!(payload["retryAfterSeconds"], 12);
        assert!(payload["suggestion"].is_string());

        let payload = error_payload(&ServerError::internal("boom"));
        assert!(payload.get("suggestion").is_none());
    }
}
