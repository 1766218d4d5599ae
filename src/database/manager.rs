//! The process-wide connection manager.
//!
//! Owns the single pool, guards every statement with a deadline and serves
//! schema snapshots through the TTL cache.

use crate::cache::{SchemaCache, SchemaSnapshot, SnapshotRead, TableColumns};
use crate::config::QueryConfig;
use crate::constants::{DEFAULT_MAX_CONNECTIONS, LOG_SQL_MAX_LEN};
use crate::database::connection::{Connector, StoreHandle};
use crate::database::metadata::{self, ColumnDescriptor};
use crate::database::query::truncate_for_log;
use crate::database::QueryResult;
use crate::error::ServerError;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Owner of the shared pool and the schema cache.
///
/// Construct one per process and share it behind an `Arc`.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    store: Mutex<Option<StoreHandle>>,
    cache: SchemaCache,
    schema: String,
    default_timeout: Duration,
    introspection_limit: usize,
}

impl ConnectionManager {
    /// Create a manager. No connection is opened until first use.
    pub fn new(connector: Arc<dyn Connector>, schema: impl Into<String>, query: &QueryConfig) -> Self {
        Self {
            connector,
            store: Mutex::new(None),
            cache: SchemaCache::new(query.schema_cache_ttl),
            schema: schema.into(),
            default_timeout: query.default_timeout,
            introspection_limit: DEFAULT_MAX_CONNECTIONS as usize,
        }
    }

    /// Cap the number of per-table lookups a refresh keeps in flight.
    /// Normally the pool's maximum size.
    pub fn with_introspection_limit(mut self, limit: usize) -> Self {
        self.introspection_limit = limit.max(1);
        self
    }

    /// The schema whose tables are exposed.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Deadline applied when the caller does not pick one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The schema cache.
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Return the shared pool, opening it on first use.
    ///
    /// Concurrent first callers wait on the same initialization and receive
    /// the same handle. A handle whose pool reports closed is replaced.
    /// Connection failures are returned as-is and not retried.
    pub async fn get_connection(&self) -> Result<StoreHandle, ServerError> {
        let mut guard = self.store.lock().await;

        if let Some(store) = guard.as_ref() {
            if !store.is_closed() {
                return Ok(Arc::clone(store));
            }
            warn!("Connection pool reported closed, re-initializing");
        }

        let store = self.connector.connect().await?;
        info!("Connection pool initialized for schema '{}'", self.schema);
        *guard = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Whether a live pool is currently held.
    pub async fn is_initialized(&self) -> bool {
        self.store
            .lock()
            .await
            .as_ref()
            .is_some_and(|store| !store.is_closed())
    }

    /// Run a statement, racing it against `timeout`.
    ///
    /// The deadline covers opening the pool, acquiring a connection and
    /// executing. On timeout the in-flight future is dropped, which returns
    /// its pooled connection; whether the server finished the statement is
    /// unknown. Timeout and execution errors carry the statement.
    pub async fn execute_query(
        &self,
        sql: &str,
        timeout: Duration,
    ) -> Result<QueryResult, ServerError> {
        debug!("Executing query: {}", truncate_for_log(sql, LOG_SQL_MAX_LEN));
        let start = Instant::now();

        let run = async {
            let store = self.get_connection().await?;
            store.fetch_all(sql).await
        };

        let mut result = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!("Query failed: {}", e);
                return Err(e.with_sql(sql));
            }
            Err(_) => {
                warn!(
                    "Query exceeded {} ms: {}",
                    timeout.as_millis(),
                    truncate_for_log(sql, LOG_SQL_MAX_LEN)
                );
                return Err(ServerError::timeout(timeout.as_millis() as u64).with_sql(sql));
            }
        };

        result.execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Query returned {} rows in {} ms",
            result.row_count(),
            result.execution_time_ms
        );
        Ok(result)
    }

    /// Run a statement with the default deadline.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, ServerError> {
        self.execute_query(sql, self.default_timeout).await
    }

    /// Column descriptors for one table of the configured schema, or `None`
    /// when the table does not exist.
    pub async fn get_table_columns(
        &self,
        table: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<ColumnDescriptor>>, ServerError> {
        let sql = metadata::describe_columns_sql(&self.schema, Some(table));
        let result = self.execute_query(&sql, timeout).await?;
        let columns = metadata::parse_columns(&result);
        Ok((!columns.is_empty()).then_some(columns))
    }

    /// Base tables of the configured schema, ordered by name.
    pub async fn list_table_names(&self, timeout: Duration) -> Result<Vec<String>, ServerError> {
        let sql = metadata::list_tables_sql(&self.schema);
        let result = self.execute_query(&sql, timeout).await?;
        Ok(metadata::parse_table_names(&result))
    }

    /// Return a snapshot no older than the cache TTL, rebuilding it if needed.
    ///
    /// If the table listing fails and an older snapshot exists, that snapshot
    /// is returned with a warning. Without one, the error is returned.
    pub async fn get_schema_snapshot(&self) -> Result<SnapshotRead, ServerError> {
        if let Some(snapshot) = self.cache.fresh() {
            return Ok(SnapshotRead {
                snapshot,
                warning: None,
            });
        }

        match self.refresh_schema().await {
            Ok(snapshot) => Ok(SnapshotRead {
                snapshot,
                warning: None,
            }),
            Err(e) => match self.cache.latest() {
                Some(snapshot) => {
                    warn!("Schema refresh failed, serving previous snapshot: {}", e);
                    let warning = format!(
                        "Schema refresh failed ({}); using schema captured at {}",
                        e,
                        snapshot.captured_at_utc.to_rfc3339()
                    );
                    Ok(SnapshotRead {
                        snapshot,
                        warning: Some(warning),
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Rebuild the snapshot: list tables, then introspect each table
    /// concurrently, at most `introspection_limit` at a time. A table whose
    /// introspection fails is recorded as unavailable instead of failing the
    /// refresh.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaSnapshot>, ServerError> {
        let timeout = self.default_timeout;
        let tables = self.list_table_names(timeout).await?;

        let lookups = tables.iter().cloned().map(|table| async move {
            let columns = match self.get_table_columns(&table, timeout).await {
                Ok(columns) => TableColumns::Columns(columns.unwrap_or_default()),
                Err(e) => {
                    warn!("Failed to introspect table '{}': {}", table, e);
                    TableColumns::Unavailable(format!("Error fetching schema: {}", e))
                }
            };
            (table, columns)
        });
        let table_info: HashMap<String, TableColumns> = stream::iter(lookups)
            .buffer_unordered(self.introspection_limit)
            .collect()
            .await;

        info!("Schema snapshot refreshed: {} tables", tables.len());
        Ok(self.cache.replace(SchemaSnapshot::new(tables, table_info)))
    }

    /// Close the pool and drop cached schema.
    ///
    /// Safe to call repeatedly and before first use; the next call to
    /// [`get_connection`](Self::get_connection) opens a new pool.
    pub async fn cleanup(&self) {
        let store = self.store.lock().await.take();
        if let Some(store) = store {
            info!("Closing connection pool");
            store.close().await;
        }
        self.cache.clear();
    }
}
