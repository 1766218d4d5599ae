//! Connection pool creation for PostgreSQL.
//!
//! The pool is reached through the [`SqlStore`] seam so the manager, cache
//! and router can be exercised without a live server.

use crate::config::{DatabaseConfig, SslMode};
use crate::database::QueryResult;
use crate::error::ServerError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::sync::Arc;
use tracing::{debug, info};

/// A pooled connection source that can run one statement at a time per checkout.
///
/// Implementations check a connection out for the duration of `fetch_all` and
/// return it when the future completes or is dropped.
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Run a statement and collect every row.
    async fn fetch_all(&self, sql: &str) -> Result<QueryResult, ServerError>;

    /// Close the pool, waiting for checked-out connections to return.
    async fn close(&self);

    /// Whether the pool has been closed.
    fn is_closed(&self) -> bool;
}

/// Shared handle to the live pool.
pub type StoreHandle = Arc<dyn SqlStore>;

/// Opens a pool. Called at most once per live handle.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<StoreHandle, ServerError>;
}

/// [`SqlStore`] backed by an sqlx PostgreSQL pool.
pub struct PgStore {
    pool: PgPool,
}

#[async_trait]
impl SqlStore for PgStore {
    async fn fetch_all(&self, sql: &str) -> Result<QueryResult, ServerError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(QueryResult::from_pg_rows(&rows))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// [`Connector`] that builds a [`PgStore`] from configuration.
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<StoreHandle, ServerError> {
        let pool = create_pool(&self.config).await?;
        Ok(Arc::new(PgStore { pool }))
    }
}

/// Build the connect options, pinning `search_path` to the configured schema
/// so generated statements can use bare table names.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let ssl_mode = match config.ssl_mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
    };

    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode)
        .application_name(&config.application_name)
        .options([("search_path", config.schema.as_str())])
}

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, ServerError> {
    info!(
        "Creating connection pool for {}:{}/{} (min: {}, max: {})",
        config.host,
        config.port,
        config.database,
        config.pool.min_connections,
        config.pool.max_connections
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.pool.min_connections)
        .max_connections(config.pool.max_connections)
        .idle_timeout(config.pool.idle_timeout)
        .acquire_timeout(config.pool.connection_timeout)
        .test_before_acquire(true)
        .connect_with(connect_options(config))
        .await
        .map_err(|e| ServerError::connection_with_source("Failed to create connection pool", e))?;

    // Test the pool by running a trivial statement
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| {
            ServerError::connection(format!("Failed to establish initial connection: {}", e))
        })?;
    debug!("Initial connection test successful");

    info!("Connection pool created successfully");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    fn test_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "test".to_string(),
            database: "postgres".to_string(),
            schema: "public".to_string(),
            ssl_mode: SslMode::Disable,
            pool: PoolConfig::default(),
            application_name: "test".to_string(),
        }
    }

    #[test]
    fn test_connect_options() {
        let options = connect_options(&test_config());
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("postgres"));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_connection_error() {
        let mut config = test_config();
        config.host = "127.0.0.1".to_string();
        config.port = 1; // nothing listens here
        config.pool.min_connections = 0;
        config.pool.connection_timeout = std::time::Duration::from_millis(500);

        let err = PgConnector::new(config).connect().await.err().unwrap();
        assert!(matches!(err, ServerError::Connection { .. }));
    }
}
