//! PostgreSQL MCP Server entry point.
//!
//! This binary starts the MCP server using stdio transport for integration
//! with Claude Desktop, Cursor, and other MCP clients.

use anyhow::Result;
use mcpkit::prelude::*;
use mcpkit::transport::stdio::StdioTransport;
use pg_mcp_server::{Config, PgMcpServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    tracing::info!("PostgreSQL MCP Server v{} starting (transport: stdio)", version);

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        "Configuration loaded: {}:{}/{} schema '{}'",
        config.database.host,
        config.database.port,
        config.database.database,
        config.database.schema
    );

    // The pool is created lazily on the first tool call
    let server = PgMcpServer::new(config)?;

    let mcp = ServerBuilder::new(server.clone())
        .with_tools(server.clone())
        .build();

    tokio::select! {
        result = mcp.serve(StdioTransport::new()) => {
            if let Err(e) = result {
                tracing::error!("Service error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    server.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,pg_mcp_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
