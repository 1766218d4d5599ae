//! Natural-language request routing.

use crate::agent::{ComplexQueryDelegate, DelegatedAnswer};
use crate::cache::SchemaSnapshot;
use crate::constants::TABLE_PREVIEW_ROWS;
use crate::database::{metadata, ConnectionManager, QueryResult};
use crate::error::ServerError;
use crate::routing::builder::{QueryBuilder, QueryPlan};
use crate::routing::intent::{classify, Intent, ParsedRequest};
use crate::routing::resolver::find_candidate_tables;
use crate::routing::EntityCategory;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a routed request was answered.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// A generated statement ran.
    Executed { plan: QueryPlan, result: QueryResult },
    /// The agent delegate answered; passed through unmodified.
    Delegated(DelegatedAnswer),
    /// The delegate was unavailable or failed.
    Diagnostic(String),
}

/// A routed request.
#[derive(Debug, Clone)]
pub struct RoutedQuery {
    pub intent: Intent,
    pub outcome: RouteOutcome,
    /// Set when the schema snapshot used was stale.
    pub warning: Option<String>,
}

impl RoutedQuery {
    /// The SQL that ran or that the delegate reported.
    pub fn sql(&self) -> Option<&str> {
        match &self.outcome {
            RouteOutcome::Executed { plan, .. } => Some(&plan.sql),
            RouteOutcome::Delegated(answer) => answer.sql.as_deref(),
            RouteOutcome::Diagnostic(_) => None,
        }
    }
}

/// Rows found for an entity category.
#[derive(Debug, Clone)]
pub struct EntityLookup {
    pub category: EntityCategory,
    pub plan: QueryPlan,
    pub result: QueryResult,
}

/// Maps free text onto generated SQL and runs it.
pub struct NlRouter {
    db: Arc<ConnectionManager>,
    builder: QueryBuilder,
    delegate: Option<Arc<dyn ComplexQueryDelegate>>,
    max_query_length: usize,
}

impl NlRouter {
    pub fn new(
        db: Arc<ConnectionManager>,
        builder: QueryBuilder,
        delegate: Option<Arc<dyn ComplexQueryDelegate>>,
        max_query_length: usize,
    ) -> Self {
        Self {
            db,
            builder,
            delegate,
            max_query_length,
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Classify `query` and answer it.
    ///
    /// Empty or over-long input is rejected before any store access. Store
    /// failures are returned with the offending SQL attached.
    pub async fn route(&self, query: &str) -> Result<RoutedQuery, ServerError> {
        let request = self.parse(query)?;
        let read = self.db.get_schema_snapshot().await?;
        let snapshot = read.snapshot;

        let intent = classify(&request, &snapshot);
        info!("Routing {:?} as {:?}", request.text(), intent.kind());

        let outcome = match &intent {
            Intent::Count { table: None } => {
                self.run(QueryPlan::catalog(metadata::count_tables_sql(self.db.schema())))
                    .await?
            }
            Intent::Count { table: Some(name) } => {
                let table = resolve_table(&snapshot, name)?;
                self.run(self.builder.count_rows(table)).await?
            }
            Intent::Complex => self.delegate(request.text()).await,
            Intent::ShowData { table } => {
                let name = table.as_deref().ok_or_else(|| {
                    ServerError::not_found(
                        "No table named in the request; try \"show data from <table>\"",
                    )
                })?;
                let table = resolve_table(&snapshot, name)?;
                self.run(self.builder.table_dump(table, TABLE_PREVIEW_ROWS))
                    .await?
            }
            Intent::ListTables | Intent::Fallback => {
                self.run(QueryPlan::catalog(metadata::list_tables_sql(self.db.schema())))
                    .await?
            }
            Intent::DescribeSchema { table: None } => {
                self.run(QueryPlan::catalog(metadata::describe_columns_sql(
                    self.db.schema(),
                    None,
                )))
                .await?
            }
            Intent::DescribeSchema { table: Some(name) } => {
                let table = resolve_table(&snapshot, name)?;
                let sql = metadata::describe_columns_sql(self.db.schema(), Some(table));
                self.run(QueryPlan::for_table(sql, table)).await?
            }
            Intent::EntityLookup { category } => {
                let found = self.lookup_in(&snapshot, *category, None).await?;
                RouteOutcome::Executed {
                    plan: found.plan,
                    result: found.result,
                }
            }
            Intent::TableDump { table } => {
                self.run(self.builder.table_dump(table, TABLE_PREVIEW_ROWS))
                    .await?
            }
        };

        Ok(RoutedQuery {
            intent,
            outcome,
            warning: read.warning,
        })
    }

    /// Find entities of the category named in `query`.
    ///
    /// Candidate tables are tried in catalog order; a candidate that errors
    /// or returns no rows is skipped. `NotFound` when no category is named,
    /// no table matches, or every candidate was skipped.
    pub async fn lookup_entities(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<EntityLookup, ServerError> {
        let request = self.parse(query)?;
        let category = EntityCategory::detect(request.words()).ok_or_else(|| {
            let known: Vec<&str> = EntityCategory::ALL.iter().map(|c| c.name()).collect();
            ServerError::not_found(format!(
                "No entity category recognized in the request (known: {})",
                known.join(", ")
            ))
        })?;

        let read = self.db.get_schema_snapshot().await?;
        self.lookup_in(&read.snapshot, category, limit).await
    }

    async fn lookup_in(
        &self,
        snapshot: &SchemaSnapshot,
        category: EntityCategory,
        limit: Option<usize>,
    ) -> Result<EntityLookup, ServerError> {
        let candidates = find_candidate_tables(&snapshot.tables, category);
        if candidates.is_empty() {
            return Err(ServerError::not_found(format!(
                "No tables found for entity '{}'",
                category
            )));
        }

        for table in &candidates {
            let columns = snapshot.column_names(table);
            let plan = self
                .builder
                .build_entity_query(table, &columns, category, limit);

            match self.db.execute(&plan.sql).await {
                Ok(result) if !result.is_empty() => {
                    debug!("Entity '{}' resolved to table '{}'", category, table);
                    return Ok(EntityLookup {
                        category,
                        plan,
                        result,
                    });
                }
                Ok(_) => debug!("Candidate table '{}' has no {} rows", table, category),
                Err(e) => warn!("Skipping candidate table '{}': {}", table, e),
            }
        }

        Err(ServerError::not_found(format!(
            "No rows found for entity '{}' in candidate tables: {}",
            category,
            candidates.join(", ")
        )))
    }

    fn parse(&self, query: &str) -> Result<ParsedRequest, ServerError> {
        if query.trim().is_empty() {
            return Err(ServerError::invalid_input("Query cannot be empty"));
        }
        if query.len() > self.max_query_length {
            return Err(ServerError::invalid_input(format!(
                "Query exceeds maximum length of {} bytes",
                self.max_query_length
            )));
        }
        Ok(ParsedRequest::parse(query))
    }

    async fn run(&self, plan: QueryPlan) -> Result<RouteOutcome, ServerError> {
        let result = self.db.execute(&plan.sql).await?;
        Ok(RouteOutcome::Executed { plan, result })
    }

    async fn delegate(&self, query: &str) -> RouteOutcome {
        let Some(delegate) = &self.delegate else {
            return RouteOutcome::Diagnostic(
                "This request needs the query agent, but no agent is configured (set AGENT_URL)"
                    .to_string(),
            );
        };

        match delegate.delegate_complex_query(query).await {
            Ok(answer) => RouteOutcome::Delegated(answer),
            Err(e) => {
                warn!("Agent delegate failed: {}", e);
                RouteOutcome::Diagnostic(format!("Error processing complex query: {}", e))
            }
        }
    }
}

/// Resolve a table name from the request against the snapshot.
fn resolve_table<'a>(snapshot: &'a SchemaSnapshot, name: &str) -> Result<&'a str, ServerError> {
    snapshot
        .find_table(name)
        .ok_or_else(|| ServerError::not_found(format!("Table '{}' does not exist", name)))
}
