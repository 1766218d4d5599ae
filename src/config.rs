//! Configuration management for the PostgreSQL MCP Server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_AGENT_TIMEOUT_SECS, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_QUERY_LENGTH,
    DEFAULT_MIN_CONNECTIONS, DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT, DEFAULT_QUERY_TIMEOUT_MS,
    DEFAULT_RATE_LIMIT_RPM, DEFAULT_ROW_LIMIT, DEFAULT_SCHEMA, DEFAULT_SCHEMA_CACHE_TTL,
    DEFAULT_SCHEMA_CACHE_TTL_SECS, MAX_ROW_LIMIT, RATE_WINDOW,
};
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Query execution configuration
    pub query: QueryConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Complex-query agent delegate configuration
    pub agent: AgentConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL hostname or IP address
    pub host: String,

    /// PostgreSQL port (default: 5432)
    pub port: u16,

    /// Login role
    pub username: String,

    /// Password for the login role
    #[serde(skip_serializing)]
    pub password: String,

    /// Database name
    pub database: String,

    /// Schema whose base tables are exposed
    pub schema: String,

    /// TLS negotiation mode
    pub ssl_mode: SslMode,

    /// Connection pool configuration
    pub pool: PoolConfig,

    /// Application name reported to the server
    pub application_name: String,
}

/// TLS negotiation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl SslMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" => Some(SslMode::Disable),
            "prefer" => Some(SslMode::Prefer),
            "require" | "on" | "true" => Some(SslMode::Require),
            _ => None,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection (acquire) timeout
    pub connection_timeout: Duration,

    /// Idle connection timeout
    pub idle_timeout: Duration,
}

/// Query execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Deadline applied to every statement
    pub default_timeout: Duration,

    /// Time-to-live of the schema snapshot
    pub schema_cache_ttl: Duration,

    /// Row limit used when the caller does not supply one
    pub default_row_limit: usize,

    /// Hard cap on any row limit
    pub max_row_limit: usize,

    /// Allow statements other than SELECT/WITH through `run-sql-query`
    pub allow_dml: bool,

    /// Maximum request or statement length (bytes)
    pub max_query_length: usize,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable per-client rate windows
    pub enabled: bool,

    /// Requests allowed per window
    pub max_requests: u32,

    /// Window length
    pub window: Duration,
}

/// Complex-query agent delegate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Endpoint accepting `{"query": ...}` (delegation disabled when unset)
    pub url: Option<String>,

    /// Request timeout for the delegate
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `PG_HOST`: PostgreSQL hostname
    /// - `PG_USER`: login role
    /// - `PG_PASSWORD`: password
    ///
    /// ## Optional
    /// - `PG_PORT`: Port number (default: 5432)
    /// - `PG_DATABASE`: Database name (default: postgres)
    /// - `PG_SCHEMA`: Schema exposed to the tools (default: public)
    /// - `PG_SSL_MODE`: disable, prefer, require (default: prefer)
    /// - `PG_POOL_MIN`: Minimum pool connections (default: 1)
    /// - `PG_POOL_MAX`: Maximum pool connections (default: 10)
    /// - `PG_CONNECT_TIMEOUT`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT`: Idle timeout in seconds (default: 300)
    /// - `PG_QUERY_TIMEOUT_MS`: Query deadline in milliseconds (default: 30000)
    /// - `PG_SCHEMA_CACHE_TTL`: Schema cache TTL in seconds (default: 300)
    /// - `PG_DEFAULT_ROW_LIMIT`: Default row limit (default: 100)
    /// - `PG_MAX_ROW_LIMIT`: Hard row cap (default: 10000)
    /// - `PG_ALLOW_DML`: Allow non-SELECT statements (default: false)
    /// - `PG_MAX_QUERY_LENGTH`: Maximum input length in bytes (default: 100000)
    /// - `MCP_RATE_LIMIT_ENABLED`, `MCP_RATE_LIMIT_RPM`: rate window settings
    /// - `AGENT_URL`, `AGENT_TIMEOUT_SECS`: complex-query delegate
    pub fn from_env() -> Result<Self, ServerError> {
        // Required: Host
        let host = std::env::var("PG_HOST")
            .map_err(|_| ServerError::config("PG_HOST environment variable is required"))?;

        let username = std::env::var("PG_USER").ok();
        let password = std::env::var("PG_PASSWORD").ok();

        let (username, password) = match (username, password) {
            (Some(u), Some(p)) => (u, p),
            (Some(_), None) => {
                return Err(ServerError::config(
                    "PG_PASSWORD is required when PG_USER is set",
                ))
            }
            (None, Some(_)) => {
                return Err(ServerError::config(
                    "PG_USER is required when PG_PASSWORD is set",
                ))
            }
            (None, None) => {
                return Err(ServerError::config(
                    "Authentication required: set PG_USER and PG_PASSWORD",
                ))
            }
        };

        let port = env_parse("PG_PORT").unwrap_or(DEFAULT_PORT);

        let database = std::env::var("PG_DATABASE").unwrap_or_else(|_| "postgres".to_string());

        let schema = std::env::var("PG_SCHEMA")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

        let ssl_mode = std::env::var("PG_SSL_MODE")
            .ok()
            .and_then(|m| SslMode::parse(&m))
            .unwrap_or_default();

        // Optional: Pool settings
        let min_connections = env_parse("PG_POOL_MIN").unwrap_or(DEFAULT_MIN_CONNECTIONS);
        let max_connections = env_parse("PG_POOL_MAX").unwrap_or(DEFAULT_MAX_CONNECTIONS);

        if min_connections > max_connections {
            return Err(ServerError::config(format!(
                "PG_POOL_MIN ({}) must not exceed PG_POOL_MAX ({})",
                min_connections, max_connections
            )));
        }

        let connection_timeout_secs =
            env_parse("PG_CONNECT_TIMEOUT").unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        let idle_timeout_secs = env_parse("PG_IDLE_TIMEOUT").unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        // Optional: Query settings
        let query_timeout_ms = env_parse("PG_QUERY_TIMEOUT_MS").unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);
        let schema_cache_ttl_secs =
            env_parse("PG_SCHEMA_CACHE_TTL").unwrap_or(DEFAULT_SCHEMA_CACHE_TTL_SECS);
        let max_row_limit: usize = env_parse("PG_MAX_ROW_LIMIT").unwrap_or(MAX_ROW_LIMIT);
        let default_row_limit = env_parse::<usize>("PG_DEFAULT_ROW_LIMIT")
            .unwrap_or(DEFAULT_ROW_LIMIT)
            .min(max_row_limit);
        let allow_dml = env_flag("PG_ALLOW_DML").unwrap_or(false);
        let max_query_length =
            env_parse("PG_MAX_QUERY_LENGTH").unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        // Optional: Rate limiting
        let rate_limit_enabled = env_flag("MCP_RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_rpm = env_parse("MCP_RATE_LIMIT_RPM").unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        // Optional: Agent delegate
        let agent_url = std::env::var("AGENT_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());
        let agent_timeout_secs =
            env_parse("AGENT_TIMEOUT_SECS").unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS);

        Ok(Config {
            database: DatabaseConfig {
                host,
                port,
                username,
                password,
                database,
                schema,
                ssl_mode,
                pool: PoolConfig {
                    min_connections,
                    max_connections,
                    connection_timeout: Duration::from_secs(connection_timeout_secs),
                    idle_timeout: Duration::from_secs(idle_timeout_secs),
                },
                application_name: "pg-mcp-server".to_string(),
            },
            query: QueryConfig {
                default_timeout: Duration::from_millis(query_timeout_ms),
                schema_cache_ttl: Duration::from_secs(schema_cache_ttl_secs),
                default_row_limit,
                max_row_limit,
                allow_dml,
                max_query_length,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                max_requests: rate_limit_rpm,
                window: RATE_WINDOW,
            },
            agent: AgentConfig {
                url: agent_url,
                timeout: Duration::from_secs(agent_timeout_secs),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            username: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            ssl_mode: SslMode::default(),
            pool: PoolConfig::default(),
            application_name: "pg-mcp-server".to_string(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_QUERY_TIMEOUT,
            schema_cache_ttl: DEFAULT_SCHEMA_CACHE_TTL,
            default_row_limit: DEFAULT_ROW_LIMIT,
            max_row_limit: MAX_ROW_LIMIT,
            allow_dml: false,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: DEFAULT_RATE_LIMIT_RPM,
            window: RATE_WINDOW,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PG_HOST",
        "PG_USER",
        "PG_PASSWORD",
        "PG_PORT",
        "PG_SCHEMA",
        "PG_POOL_MIN",
        "PG_POOL_MAX",
        "PG_ALLOW_DML",
        "PG_DEFAULT_ROW_LIMIT",
        "PG_MAX_ROW_LIMIT",
        "PG_SSL_MODE",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_query_config_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.schema_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.default_row_limit, 100);
        assert_eq!(config.max_row_limit, 10_000);
        assert!(!config.allow_dml);
    }

    #[test]
    #[serial]
    fn test_from_env_requires_host() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("PG_HOST", "db.internal");
        std::env::set_var("PG_USER", "reader");
        std::env::set_var("PG_PASSWORD", "secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.database.ssl_mode, SslMode::Prefer);
        assert!(!config.query.allow_dml);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("PG_HOST", "db.internal");
        std::env::set_var("PG_USER", "reader");
        std::env::set_var("PG_PASSWORD", "secret");
        std::env::set_var("PG_SCHEMA", "telemetry");
        std::env::set_var("PG_ALLOW_DML", "true");
        std::env::set_var("PG_MAX_ROW_LIMIT", "500");
        std::env::set_var("PG_DEFAULT_ROW_LIMIT", "1000");
        std::env::set_var("PG_SSL_MODE", "require");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database.schema, "telemetry");
        assert!(config.query.allow_dml);
        assert_eq!(config.query.max_row_limit, 500);
        assert_eq!(config.query.default_row_limit, 500);
        assert_eq!(config.database.ssl_mode, SslMode::Require);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_inverted_pool_bounds() {
        clear_env();
        std::env::set_var("PG_HOST", "db.internal");
        std::env::set_var("PG_USER", "reader");
        std::env::set_var("PG_PASSWORD", "secret");
        std::env::set_var("PG_POOL_MIN", "20");
        std::env::set_var("PG_POOL_MAX", "5");

        assert!(Config::from_env().is_err());
        clear_env();
    }
}
