//! Error types for the PostgreSQL MCP Server.
//!
//! Store failures are mapped to semantic variants so tool handlers can render
//! user-friendly messages and callers can tell a timeout from a rejected
//! statement.

pub use mcpkit::McpError;
use thiserror::Error;

/// Domain-specific errors for the PostgreSQL MCP Server.
///
/// Named `ServerError` to avoid collision with `mcpkit::McpError`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request, rejected before any store access
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The pool could not be established
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Deadline exceeded; the statement's outcome is indeterminate
    #[error("Query timeout: operation exceeded {timeout_ms} ms{}", sql_suffix(.sql))]
    Timeout {
        timeout_ms: u64,
        sql: Option<String>,
    },

    /// The store rejected the statement
    #[error("Query execution error: {message}{}", sql_suffix(.sql))]
    QueryExecution {
        message: String,
        sql: Option<String>,
        sql_state: Option<String>,
    },

    /// No table or entity could be resolved
    #[error("Not found: {0}")]
    NotFound(String),

    /// Statement refused by the read-only policy
    #[error("Rejected by policy: {0}")]
    PolicyRejected(String),

    /// Too many requests in the current window
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    /// The complex-query agent failed or answered with garbage
    #[error("Agent delegate error: {0}")]
    Delegate(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn sql_suffix(sql: &Option<String>) -> String {
    match sql {
        Some(sql) => format!(" [sql: {}]", sql),
        None => String::new(),
    }
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout {
            timeout_ms,
            sql: None,
        }
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql: None,
            sql_state: None,
        }
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a policy rejection.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyRejected(msg.into())
    }

    /// Create an agent delegate error.
    pub fn delegate(msg: impl Into<String>) -> Self {
        Self::Delegate(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach the offending statement to timeout and execution errors.
    ///
    /// Other variants are returned unchanged.
    pub fn with_sql(self, statement: &str) -> Self {
        match self {
            Self::Timeout { timeout_ms, .. } => Self::Timeout {
                timeout_ms,
                sql: Some(statement.to_string()),
            },
            Self::QueryExecution {
                message, sql_state, ..
            } => Self::QueryExecution {
                message,
                sql: Some(statement.to_string()),
                sql_state,
            },
            other => other,
        }
    }

    /// The SQL attached to this error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Timeout { sql, .. } | Self::QueryExecution { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Connection { .. } => "connection_error",
            Self::Timeout { .. } => "query_timeout",
            Self::QueryExecution { .. } => "query_execution_error",
            Self::NotFound(_) => "not_found",
            Self::PolicyRejected(_) => "policy_rejected",
            Self::RateLimited { .. } => "rate_limited",
            Self::Delegate(_) => "delegate_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::Connection { .. } => {
                Some("Check host, port, credentials, and network connectivity")
            }
            Self::Timeout { .. } => Some("Try a simpler query or increase PG_QUERY_TIMEOUT_MS"),
            Self::NotFound(_) => Some("Use list-database-tables to see the available tables"),
            Self::PolicyRejected(_) => {
                Some("Only SELECT and WITH statements are allowed unless PG_ALLOW_DML is set")
            }
            Self::RateLimited { .. } => Some("Wait for the rate window to reset and retry"),
            _ => None,
        }
    }
}

/// Convert ServerError to mcpkit's McpError for protocol responses.
///
/// Note: Tool errors should generally return `ToolOutput::error()` with a message
/// instead of using this conversion. This is primarily for protocol-level errors.
impl From<ServerError> for McpError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Config(msg) => McpError::invalid_request(msg),
            ServerError::InvalidInput(msg) => McpError::invalid_params("input", msg),
            ServerError::PolicyRejected(msg) => McpError::invalid_params("sql", msg),
            ServerError::NotFound(msg) => McpError::invalid_params("name", msg),
            other => McpError::internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => ServerError::QueryExecution {
                message: db.message().to_string(),
                sql: None,
                sql_state: db.code().map(|c| c.to_string()),
            },
            sqlx::Error::PoolTimedOut => {
                ServerError::connection("Timed out waiting for a pooled connection")
            }
            sqlx::Error::PoolClosed => ServerError::connection("Connection pool is closed"),
            e @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_)) => {
                ServerError::connection_with_source(format!("Connection failed: {}", e), e)
            }
            sqlx::Error::Configuration(e) => ServerError::config(e.to_string()),
            e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                ServerError::query_error(format!("Type conversion error: {}", e))
            }
            other => ServerError::query_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sql_attaches_statement() {
        let err = ServerError::timeout(500).with_sql("SELECT pg_sleep(10)");
        assert_eq!(err.sql(), Some("SELECT pg_sleep(10)"));
        assert!(err.to_string().contains("500 ms"));
        assert!(err.to_string().contains("pg_sleep"));

        let err = ServerError::query_error("relation does not exist").with_sql("SELECT 1");
        assert_eq!(err.sql(), Some("SELECT 1"));

        let err = ServerError::not_found("users").with_sql("SELECT 1");
        assert!(err.sql().is_none());
    }

    #[test]
    fn test_error_suggestions() {
        assert!(ServerError::policy("DELETE").suggestion().is_some());
        assert!(ServerError::internal("unknown").suggestion().is_none());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(ServerError::timeout(1).kind(), "query_timeout");
        assert_eq!(ServerError::not_found("x").kind(), "not_found");
    }
}
