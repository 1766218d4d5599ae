//! MCP server struct definition and initialization.

use crate::agent::{ComplexQueryDelegate, HttpAgentDelegate};
use crate::config::Config;
use crate::database::{ConnectionManager, Connector, PgConnector};
use crate::error::ServerError;
use crate::rate_limit::RateLimiter;
use crate::routing::{NlRouter, QueryBuilder};
use crate::security::{QueryValidator, ValidationMode};
use std::sync::Arc;

/// Client id used for rate windows on the stdio transport, which serves a
/// single client.
pub const STDIO_CLIENT_ID: &str = "stdio";

/// The PostgreSQL MCP Server instance.
///
/// Cloned per request; all state is shared through `Arc`s. No connection is
/// opened until the first tool call needs one.
#[derive(Clone)]
pub struct PgMcpServer {
    /// Configuration.
    pub(crate) config: Arc<Config>,

    /// The connection manager (pool and schema cache).
    pub(crate) db: Arc<ConnectionManager>,

    /// Natural-language router.
    pub(crate) router: Arc<NlRouter>,

    /// Statement policy for `run-sql-query`.
    pub(crate) validator: Arc<QueryValidator>,

    /// Per-client request windows.
    pub(crate) rate_limiter: Arc<RateLimiter>,
}

impl PgMcpServer {
    /// Create a server backed by PostgreSQL, with the HTTP agent delegate
    /// when `AGENT_URL` is configured.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let connector = Arc::new(PgConnector::new(config.database.clone()));
        let delegate = HttpAgentDelegate::from_config(&config.agent)?
            .map(|d| Arc::new(d) as Arc<dyn ComplexQueryDelegate>);
        Ok(Self::with_parts(config, connector, delegate))
    }

    /// Create a server over any connector and delegate.
    pub fn with_parts(
        config: Config,
        connector: Arc<dyn Connector>,
        delegate: Option<Arc<dyn ComplexQueryDelegate>>,
    ) -> Self {
        let db = Arc::new(
            ConnectionManager::new(connector, config.database.schema.clone(), &config.query)
                .with_introspection_limit(config.database.pool.max_connections as usize),
        );

        let builder = QueryBuilder::new(config.query.default_row_limit, config.query.max_row_limit);
        let router = Arc::new(NlRouter::new(
            Arc::clone(&db),
            builder,
            delegate,
            config.query.max_query_length,
        ));

        let validator = Arc::new(QueryValidator::new(
            ValidationMode::from_allow_dml(config.query.allow_dml),
            config.query.max_query_length,
        ));

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            config: Arc::new(config),
            db,
            router,
            validator,
            rate_limiter,
        }
    }

    /// Create a server from environment variables.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::new(Config::from_env()?)
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the connection manager.
    pub fn db(&self) -> &ConnectionManager {
        &self.db
    }

    /// Get a reference to the router.
    pub fn router(&self) -> &NlRouter {
        &self.router
    }

    /// Get a reference to the query validator.
    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// Get a reference to the rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Release the pool and cached schema.
    pub async fn shutdown(&self) {
        self.db.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, DatabaseConfig, QueryConfig, RateLimitConfig};
    use crate::database::scripted::{ScriptedConnector, ScriptedStore};

    fn test_config(allow_dml: bool) -> Config {
        Config {
            database: DatabaseConfig::default(),
            query: QueryConfig {
                allow_dml,
                ..QueryConfig::default()
            },
            rate_limit: RateLimitConfig::default(),
            agent: AgentConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_construction_does_not_connect() {
        let connector = Arc::new(ScriptedConnector::new(Arc::new(ScriptedStore::new())));
        let server = PgMcpServer::with_parts(test_config(false), connector.clone(), None);

        assert_eq!(connector.connects(), 0);
        assert!(!server.db().is_initialized().await);
        assert_eq!(server.validator().mode(), ValidationMode::ReadOnly);
    }

    #[test]
    fn test_dml_flag_selects_mode() {
        let connector = Arc::new(ScriptedConnector::new(Arc::new(ScriptedStore::new())));
        let server = PgMcpServer::with_parts(test_config(true), connector, None);
        assert_eq!(server.validator().mode(), ValidationMode::AllowDml);
    }

    #[tokio::test]
    async fn test_shutdown_before_use() {
        let connector = Arc::new(ScriptedConnector::new(Arc::new(ScriptedStore::new())));
        let server = PgMcpServer::with_parts(test_config(false), connector, None);
        server.shutdown().await;
        server.shutdown().await;
    }
}
