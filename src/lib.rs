//! # PostgreSQL MCP Server
//!
//! A Model Context Protocol (MCP) tool server over PostgreSQL.
//!
//! This crate provides:
//! - **Connection management**: A lazily created, shared pool with per-query deadlines
//! - **Schema caching**: A TTL snapshot of tables and columns, refreshed concurrently
//! - **Natural-language routing**: Keyword intents mapped onto generated SQL
//! - **Tools**: Table listing, schema inspection, policy-checked SQL, entity lookup
//!
//! ## Architecture
//!
//! One [`ConnectionManager`](database::ConnectionManager) is built at startup
//! and shared by the router and the tools. Requests that need joins across
//! entities are handed to an optional
//! [`ComplexQueryDelegate`](agent::ComplexQueryDelegate).

pub mod agent;
pub mod cache;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routing;
pub mod security;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{McpError, ServerError};
pub use server::PgMcpServer;
