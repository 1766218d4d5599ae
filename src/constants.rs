//! Centralized constants for the PostgreSQL MCP Server.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default connection (pool acquire) timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default query timeout in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

/// Default query timeout as Duration.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS);

/// Default timeout for the complex-query agent delegate in seconds.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Connection Pool Constants
// =============================================================================

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Default minimum connections in pool.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default schema searched for tables.
pub const DEFAULT_SCHEMA: &str = "public";

// =============================================================================
// Result Size Constants
// =============================================================================

/// Default row limit for generated and caller-supplied queries.
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Hard cap on any row limit.
pub const MAX_ROW_LIMIT: usize = 10_000;

/// Row limit used when dumping a table directly by name.
pub const TABLE_PREVIEW_ROWS: usize = 50;

/// Maximum number of columns selected when no preferred column matches.
pub const FALLBACK_COLUMN_COUNT: usize = 3;

/// Default maximum length of a request or statement, in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 100_000;

// =============================================================================
// Cache Constants
// =============================================================================

/// Default schema cache TTL in seconds.
pub const DEFAULT_SCHEMA_CACHE_TTL_SECS: u64 = 300;

/// Default schema cache TTL as Duration.
pub const DEFAULT_SCHEMA_CACHE_TTL: Duration = Duration::from_secs(DEFAULT_SCHEMA_CACHE_TTL_SECS);

// =============================================================================
// Rate Limiting Constants
// =============================================================================

/// Default requests allowed per client per window.
pub const DEFAULT_RATE_LIMIT_RPM: u32 = 120;

/// Length of one rate window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

// =============================================================================
// Logging Constants
// =============================================================================

/// Maximum SQL length written to debug logs.
pub const LOG_SQL_MAX_LEN: usize = 200;
