//! In-memory [`SqlStore`] that answers catalog queries from a fixed table
//! list and everything else from scripted responses.
//!
//! Used to exercise the manager, schema cache and router without a server.
//! Every statement is recorded, so tests can assert on round trips.

use crate::database::connection::{Connector, SqlStore, StoreHandle};
use crate::database::metadata::ColumnDescriptor;
use crate::database::{QueryResult, SqlValue};
use crate::error::ServerError;
use crate::security::quote_literal;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted store. Build it with the `with_*` methods, then share it.
#[derive(Default)]
pub struct ScriptedStore {
    tables: Vec<(String, Vec<ColumnDescriptor>)>,
    responses: HashMap<String, Result<QueryResult, String>>,
    failing_tables: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    fail_table_listing: AtomicBool,
    closed: AtomicBool,
    executed: Mutex<Vec<String>>,
    table_list_calls: AtomicUsize,
    column_calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a base table with its columns, in catalog order.
    pub fn with_table(mut self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.tables.push((name.to_string(), columns));
        self
    }

    /// Answer `sql` (exact text) with `result`.
    pub fn with_response(mut self, sql: &str, result: QueryResult) -> Self {
        self.responses.insert(sql.to_string(), Ok(result));
        self
    }

    /// Answer `sql` (exact text) with a store-reported error.
    pub fn with_error(mut self, sql: &str, message: &str) -> Self {
        self.responses.insert(sql.to_string(), Err(message.to_string()));
        self
    }

    /// Delay every statement by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Make the base-table listing fail.
    pub fn set_fail_table_listing(&self, fail: bool) {
        self.fail_table_listing.store(fail, Ordering::SeqCst);
    }

    /// Make column introspection for `table` fail.
    pub fn fail_columns_for(&self, table: &str) {
        self.failing_tables.lock().insert(table.to_string());
    }

    /// Every statement received, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Number of statements received.
    pub fn calls(&self) -> usize {
        self.executed.lock().len()
    }

    /// Number of base-table listings received.
    pub fn table_list_calls(&self) -> usize {
        self.table_list_calls.load(Ordering::SeqCst)
    }

    /// Number of column introspections received.
    pub fn column_calls(&self) -> usize {
        self.column_calls.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn answer(&self, sql: &str) -> Result<QueryResult, ServerError> {
        if let Some(scripted) = self.responses.get(sql) {
            return scripted.clone().map_err(ServerError::query_error);
        }

        if sql.contains("FROM information_schema.tables") && sql.starts_with("SELECT table_name") {
            self.table_list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_table_listing.load(Ordering::SeqCst) {
                return Err(ServerError::query_error("catalog unavailable"));
            }
            let rows = self
                .tables
                .iter()
                .map(|(name, _)| vec![SqlValue::from(name.as_str())])
                .collect();
            return Ok(QueryResult::from_values(&["table_name"], rows));
        }

        if sql.contains("FROM information_schema.tables") && sql.contains("COUNT(*)") {
            return Ok(QueryResult::from_values(
                &["table_count"],
                vec![vec![SqlValue::I64(self.tables.len() as i64)]],
            ));
        }

        if sql.contains("FROM information_schema.columns") {
            self.column_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self.failing_tables.lock().clone();
            let mut rows = Vec::new();
            for (table, columns) in &self.tables {
                let filter = format!("AND c.table_name = {}", quote_literal(table));
                if sql.contains("AND c.table_name = ") && !sql.contains(&filter) {
                    continue;
                }
                if failing.contains(table) {
                    return Err(ServerError::query_error(format!(
                        "permission denied for table {}",
                        table
                    )));
                }
                rows.extend(columns.iter().map(|col| column_row(table, col)));
            }
            return Ok(QueryResult::from_values(COLUMN_FIELDS, rows));
        }

        Ok(QueryResult::empty())
    }
}

const COLUMN_FIELDS: &[&str] = &[
    "table_name",
    "column_name",
    "data_type",
    "is_nullable",
    "column_default",
    "is_generated",
    "is_identity",
    "is_primary_key",
];

fn column_row(table: &str, col: &ColumnDescriptor) -> Vec<SqlValue> {
    let yes_no = |flag: bool| SqlValue::from(if flag { "YES" } else { "NO" });
    vec![
        SqlValue::from(table),
        SqlValue::from(col.name.as_str()),
        SqlValue::from(col.data_type.as_str()),
        yes_no(col.nullable),
        col.default_value
            .as_deref()
            .map(SqlValue::from)
            .unwrap_or(SqlValue::Null),
        SqlValue::from(if col.is_generated { "ALWAYS" } else { "NEVER" }),
        yes_no(false),
        SqlValue::Bool(col.is_primary_key),
    ]
}

#[async_trait]
impl SqlStore for ScriptedStore {
    async fn fetch_all(&self, sql: &str) -> Result<QueryResult, ServerError> {
        self.executed.lock().push(sql.to_string());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.closed.load(Ordering::SeqCst) {
            return Err(ServerError::connection("Connection pool is closed"));
        }

        self.answer(sql)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// [`Connector`] handing out one shared [`ScriptedStore`].
pub struct ScriptedConnector {
    store: Arc<ScriptedStore>,
    connects: AtomicUsize,
    connect_delay: Mutex<Option<Duration>>,
    fail: AtomicBool,
}

impl ScriptedConnector {
    pub fn new(store: Arc<ScriptedStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
            connect_delay: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }

    /// Number of pools opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Delay each connect by `delay`.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.connect_delay.lock() = delay;
    }

    /// Make connects fail as an unreachable server would.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<StoreHandle, ServerError> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(ServerError::connection("connection refused"));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        self.store.reopen();
        Ok(Arc::clone(&self.store) as StoreHandle)
    }
}
