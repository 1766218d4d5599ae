//! Database connectivity and query execution.

mod connection;
mod manager;
pub mod metadata;
mod query;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod types;

pub use connection::{
    connect_options, create_pool, Connector, PgConnector, PgStore, SqlStore, StoreHandle,
};
pub use manager::ConnectionManager;
pub use metadata::ColumnDescriptor;
pub(crate) use query::truncate_for_log;
pub use query::{ColumnInfo, QueryResult, ResultRow};
pub use types::{SqlValue, TypeMapper};
