//! Schema metadata caching with configurable TTL.
//!
//! Holds the table list and per-table column descriptors so requests do not
//! re-query the catalog. A snapshot is immutable; refresh swaps in a whole new
//! one and readers keep whatever `Arc` they already cloned.

use crate::database::ColumnDescriptor;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Columns recorded for one table at capture time.
#[derive(Debug, Clone, PartialEq)]
pub enum TableColumns {
    /// Introspection succeeded.
    Columns(Vec<ColumnDescriptor>),
    /// Introspection failed; the message is kept in place of the columns.
    Unavailable(String),
}

impl TableColumns {
    /// Column descriptors, empty when unavailable.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        match self {
            TableColumns::Columns(cols) => cols,
            TableColumns::Unavailable(_) => &[],
        }
    }
}

/// Catalog metadata captured at one instant.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    /// Table names in catalog order.
    pub tables: Vec<String>,

    /// Per-table column information.
    pub table_info: HashMap<String, TableColumns>,

    /// When the snapshot was captured (monotonic, for TTL checks).
    pub captured_at: Instant,

    /// When the snapshot was captured (wall clock, for display).
    pub captured_at_utc: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Capture a snapshot now.
    pub fn new(tables: Vec<String>, table_info: HashMap<String, TableColumns>) -> Self {
        Self {
            tables,
            table_info,
            captured_at: Instant::now(),
            captured_at_utc: Utc::now(),
        }
    }

    /// Get the age of this snapshot.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Whether the snapshot is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    /// Resolve a table name case-insensitively to its catalog spelling.
    pub fn find_table(&self, name: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| t.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Column descriptors for a table, empty if unknown or unavailable.
    pub fn columns(&self, table: &str) -> &[ColumnDescriptor] {
        self.table_info
            .get(table)
            .map(TableColumns::columns)
            .unwrap_or(&[])
    }

    /// Column names for a table in ordinal order.
    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.columns(table).iter().map(|c| c.name.clone()).collect()
    }
}

/// A snapshot handed to a caller, with any warning raised while obtaining it.
#[derive(Debug, Clone)]
pub struct SnapshotRead {
    pub snapshot: Arc<SchemaSnapshot>,

    /// Set when a refresh failed and an older snapshot was served instead.
    pub warning: Option<String>,
}

/// Shared, read-mostly holder of the current [`SchemaSnapshot`].
pub struct SchemaCache {
    current: RwLock<Option<Arc<SchemaSnapshot>>>,
    ttl: Duration,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            ttl,
        }
    }

    /// The current snapshot if it is within TTL.
    pub fn fresh(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current
            .read()
            .as_ref()
            .filter(|snapshot| snapshot.is_fresh(self.ttl))
            .cloned()
    }

    /// The current snapshot regardless of age.
    pub fn latest(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current.read().clone()
    }

    /// Install a new snapshot, replacing the previous one wholesale.
    pub fn replace(&self, snapshot: SchemaSnapshot) -> Arc<SchemaSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Drop the current snapshot.
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
