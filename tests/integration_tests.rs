//! Integration tests for the PostgreSQL MCP Server.
//!
//! These tests support two modes:
//! 1. **Testcontainers** (default): Automatically spins up a PostgreSQL container
//! 2. **External server**: Connect to an existing server via the PG_HOST env var
//!
//! ## Running with testcontainers (requires Docker):
//! ```bash
//! cargo test --test integration_tests -- --ignored --test-threads=1
//! ```
//!
//! ## Running against external server (e.g., CI service container):
//! ```bash
//! PG_HOST=localhost PG_PORT=5432 PG_USER=postgres PG_PASSWORD=postgres \
//!   cargo test --test integration_tests -- --ignored --test-threads=1
//! ```
//!
//! ## Testing against a specific PostgreSQL version:
//! ```bash
//! PG_TEST_VERSION=15-alpine cargo test --test integration_tests -- --ignored
//! ```

use pg_mcp_server::config::{Config, DatabaseConfig, QueryConfig};
use pg_mcp_server::handlers;
use pg_mcp_server::tools::{
    GetTableSchemaInput, ListEntityNamesInput, ListTablesInput, OutputType, QueryDatabaseInput,
    RunSqlQueryInput,
};
use pg_mcp_server::{PgMcpServer, ServerError};
use serial_test::serial;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// Default version for tests.
const DEFAULT_VERSION: &str = "16-alpine";

/// Get the PostgreSQL version to test against.
fn get_test_version() -> String {
    std::env::var("PG_TEST_VERSION").unwrap_or_else(|_| DEFAULT_VERSION.to_string())
}

/// Test database connection source.
#[allow(dead_code)] // Variants held for lifetime management (Drop trait)
enum TestDatabaseSource {
    /// External server configured via environment variables.
    External,
    /// Testcontainer-managed PostgreSQL (boxed to reduce enum size).
    Container(Box<ContainerAsync<Postgres>>),
}

/// Helper struct to manage the test database.
struct TestDatabase {
    #[allow(dead_code)] // Held for lifetime management (Drop trait on Container)
    source: TestDatabaseSource,
    database: DatabaseConfig,
}

impl TestDatabase {
    /// Uses an external server if PG_HOST is set, otherwise testcontainers.
    async fn new() -> Self {
        if std::env::var("PG_HOST").is_ok() {
            Self::from_external()
        } else {
            Self::from_testcontainer(&get_test_version()).await
        }
    }

    fn from_external() -> Self {
        let config = Config::from_env().expect("PG_HOST, PG_USER and PG_PASSWORD must be set");
        eprintln!(
            "Using external PostgreSQL at {}:{}",
            config.database.host, config.database.port
        );
        Self {
            source: TestDatabaseSource::External,
            database: config.database,
        }
    }

    async fn from_testcontainer(version: &str) -> Self {
        eprintln!("Starting PostgreSQL {} container via testcontainers...", version);

        let container = Postgres::default()
            .with_tag(version)
            .start()
            .await
            .unwrap_or_else(|e| panic!("Failed to start PostgreSQL {} container: {}", version, e));

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        eprintln!("PostgreSQL {} container ready at {}:{}", version, host, port);

        Self {
            source: TestDatabaseSource::Container(Box::new(container)),
            database: DatabaseConfig {
                host: host.to_string(),
                port,
                username: "postgres".to_string(),
                password: "postgres".to_string(),
                database: "postgres".to_string(),
                ..DatabaseConfig::default()
            },
        }
    }

    fn server(&self, query: QueryConfig) -> PgMcpServer {
        let config = Config {
            database: self.database.clone(),
            query,
            ..Config::default()
        };
        PgMcpServer::new(config).expect("Failed to create server")
    }

    /// A server with DML enabled, seeded with the fixture tables.
    async fn seeded_server(&self) -> PgMcpServer {
        let server = self.server(QueryConfig {
            allow_dml: true,
            ..QueryConfig::default()
        });
        for sql in FIXTURE {
            server
                .db()
                .execute(sql)
                .await
                .unwrap_or_else(|e| panic!("Fixture statement failed: {}: {}", sql, e));
        }
        server.db().cache().clear();
        server
    }
}

const FIXTURE: &[&str] = &[
    "DROP TABLE IF EXISTS orders",
    "DROP TABLE IF EXISTS app_users",
    "DROP TYPE IF EXISTS order_status",
    "CREATE TYPE order_status AS ENUM ('open', 'shipped')",
    "CREATE TABLE app_users (user_id SERIAL PRIMARY KEY, username TEXT NOT NULL, email TEXT)",
    "CREATE TABLE orders (id SERIAL PRIMARY KEY, user_id INT REFERENCES app_users(user_id), \
     total NUMERIC(10,2), status order_status NOT NULL DEFAULT 'open', \
     lead_time INTERVAL, tags TEXT[])",
    "INSERT INTO app_users (username, email) VALUES ('ada', 'ada@example.com'), ('grace', NULL)",
    "INSERT INTO orders (user_id, total, status, lead_time, tags) VALUES \
     (1, 10.50, 'shipped', '1 day 02:00:00', ARRAY['gift']), \
     (1, 3.25, 'open', NULL, NULL), \
     (2, 99.00, 'open', '3 mons', ARRAY['bulk', 'priority'])",
];

fn nl(query: &str) -> QueryDatabaseInput {
    QueryDatabaseInput {
        query: query.to_string(),
        output_type: OutputType::Text,
    }
}

// =============================================================================
// Connection Tests
// =============================================================================

mod connection_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_lazy_connection_and_cleanup() {
        let db = TestDatabase::new().await;
        let server = db.server(QueryConfig::default());

        assert!(!server.db().is_initialized().await);
        let result = server.db().execute("SELECT 1 AS one").await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert!(server.db().is_initialized().await);

        server.shutdown().await;
        server.shutdown().await;
        assert!(!server.db().is_initialized().await);

        server.db().execute("SELECT 1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_statement_timeout() {
        let db = TestDatabase::new().await;
        let server = db.server(QueryConfig::default());

        let err = server
            .db()
            .execute_query("SELECT pg_sleep(5)", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout { .. }));

        // The pool is still usable afterwards
        server.db().execute("SELECT 1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_execution_error_has_sql_state() {
        let db = TestDatabase::new().await;
        let server = db.server(QueryConfig::default());

        let err = server
            .db()
            .execute("SELECT * FROM no_such_table")
            .await
            .unwrap_err();
        match err {
            ServerError::QueryExecution { sql_state, sql, .. } => {
                assert_eq!(sql_state.as_deref(), Some("42P01"));
                assert_eq!(sql.as_deref(), Some("SELECT * FROM no_such_table"));
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}

// =============================================================================
// Tool Tests
// =============================================================================

mod tool_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_list_tables_and_schema() {
        let db = TestDatabase::new().await;
        let server = db.seeded_server().await;

        let tables = handlers::list_database_tables(&server, ListTablesInput::default())
            .await
            .unwrap();
        let names: Vec<&str> = tables["tableNames"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(names.contains(&"app_users"));
        assert!(names.contains(&"orders"));

        let columns = handlers::get_table_schema(
            &server,
            GetTableSchemaInput {
                table: Some("APP_USERS".to_string()),
                query: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(columns[0]["name"], "user_id");
        assert_eq!(columns[0]["isPrimaryKey"], true);
        assert_eq!(columns[1]["nullable"], false);
        assert_eq!(columns[2]["nullable"], true);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_run_sql_query_limits_rows() {
        let db = TestDatabase::new().await;
        let server = db.seeded_server().await;

        let payload = handlers::run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "SELECT * FROM orders ORDER BY id;".to_string(),
                limit: Some(2),
            },
        )
        .await
        .unwrap();

        assert_eq!(payload["rowCount"], 2);
        assert_eq!(payload["truncated"], true);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_non_text_types_keep_their_values() {
        let db = TestDatabase::new().await;
        let server = db.seeded_server().await;

        let payload = handlers::run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "SELECT status, lead_time, tags, '12.34'::money AS fee, \
                      '10.0.0.1'::inet AS addr FROM orders ORDER BY id"
                    .to_string(),
                limit: None,
            },
        )
        .await
        .unwrap();

        let rows = &payload["rows"];
        assert_eq!(rows[0]["status"], "shipped");
        assert_eq!(rows[1]["status"], "open");
        assert_eq!(rows[0]["lead_time"], "1 day 02:00:00");
        assert_eq!(rows[2]["lead_time"], "3 mons");
        assert!(rows[1]["lead_time"].is_null());
        assert_eq!(rows[2]["tags"], serde_json::json!(["bulk", "priority"]));
        assert!(rows[1]["tags"].is_null());
        assert!(!rows[0]["fee"].is_null());
        assert!(!rows[0]["addr"].is_null());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_read_only_rejects_dml() {
        let db = TestDatabase::new().await;
        let _seeded = db.seeded_server().await;
        let server = db.server(QueryConfig::default());

        let err = handlers::run_sql_query(
            &server,
            RunSqlQueryInput {
                sql: "DELETE FROM orders".to_string(),
                limit: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::PolicyRejected(_)));

        let count = server
            .db()
            .execute("SELECT COUNT(*) AS n FROM orders")
            .await
            .unwrap();
        assert_eq!(count.rows[0].get("n").and_then(|v| v.as_f64()), Some(3.0));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_natural_language_routes() {
        let db = TestDatabase::new().await;
        let server = db.seeded_server().await;

        let counted = handlers::query_database(&server, nl("how many rows in table orders"))
            .await
            .unwrap();
        assert_eq!(counted["intent"], "count");
        assert_eq!(counted["data"][0]["row_count"], 3);

        let users = handlers::query_database(&server, nl("list users"))
            .await
            .unwrap();
        assert_eq!(users["intent"], "entity_lookup");
        assert_eq!(users["data"][0]["name"], "ada");

        let dump = handlers::query_database(&server, nl("orders"))
            .await
            .unwrap();
        assert_eq!(dump["intent"], "table_dump");
        assert_eq!(dump["rowCount"], 3);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_entity_names() {
        let db = TestDatabase::new().await;
        let server = db.seeded_server().await;

        let payload = handlers::list_entity_names(
            &server,
            ListEntityNamesInput {
                query: "users".to_string(),
                limit: 1,
            },
        )
        .await
        .unwrap();

        assert_eq!(payload["table"], "app_users");
        assert_eq!(payload["results"].as_array().unwrap().len(), 1);
    }
}
