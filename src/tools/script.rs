//! Script runner behind the `db-template` binary.
//!
//! Runs a list of SQL statements in order on behalf of one logical unit. With
//! `transactional` the whole script is a single call routed through the
//! transaction boundary (all-or-nothing); otherwise every statement runs on
//! its own transient connection and auto-commits.

use crate::db::{ConnectionSource, JsonRowMapper, ResourceRegistry, StatementExecutor};
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalUnit};
use crate::tools::sql_classifier::{StatementKind, classify};
use crate::tx::{CallInterceptor, CallMetadata, Marker, MarkerMatcher, TransactionBoundary};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const RUN_TRANSACTIONAL: CallMetadata = CallMetadata::new("ScriptRunner", "run_transactional")
    .with_method_markers(&[Marker::Transactional]);

const RUN_DIRECT: CallMetadata = CallMetadata::new("ScriptRunner", "run_direct");

/// Outcome of one statement.
#[derive(Debug, Clone, Serialize)]
pub struct StatementReport {
    pub sql: String,
    pub kind: StatementKind,
    /// Set for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Set for queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
}

pub struct ScriptRunner<P: ConnectionSource> {
    executor: StatementExecutor<P>,
    interceptor: Arc<CallInterceptor<P, MarkerMatcher>>,
    db_type: DatabaseType,
}

impl<P: ConnectionSource> ScriptRunner<P> {
    pub fn new(source: Arc<P>, db_type: DatabaseType) -> Self {
        let registry = Arc::new(ResourceRegistry::new());
        let executor = StatementExecutor::new(source, registry);
        let boundary = TransactionBoundary::for_executor(&executor);
        let interceptor = Arc::new(CallInterceptor::new(
            MarkerMatcher::transactional(),
            boundary,
        ));

        Self {
            executor,
            interceptor,
            db_type,
        }
    }

    pub fn executor(&self) -> &StatementExecutor<P> {
        &self.executor
    }

    /// Run `statements` in order and report each one.
    ///
    /// Every statement is classified before anything touches the database,
    /// so a malformed script fails without side effects.
    pub async fn run(
        &self,
        unit: &LogicalUnit,
        statements: &[String],
        transactional: bool,
    ) -> DbResult<Vec<StatementReport>> {
        let classified = statements
            .iter()
            .map(|sql| classify(sql, self.db_type).map(|kind| (sql.as_str(), kind)))
            .collect::<DbResult<Vec<_>>>()?;

        info!(
            unit = %unit,
            statements = classified.len(),
            transactional,
            "Running script"
        );

        let call = if transactional {
            &RUN_TRANSACTIONAL
        } else {
            &RUN_DIRECT
        };
        self.interceptor
            .intercept(call, unit, || self.run_statements(unit, &classified))
            .await
    }

    async fn run_statements(
        &self,
        unit: &LogicalUnit,
        statements: &[(&str, StatementKind)],
    ) -> DbResult<Vec<StatementReport>> {
        let mut reports = Vec::with_capacity(statements.len());

        for &(sql, kind) in statements {
            let report = match kind {
                StatementKind::Query => {
                    let rows = self.executor.query(unit, sql, JsonRowMapper).await?;
                    StatementReport {
                        sql: sql.to_string(),
                        kind,
                        rows_affected: None,
                        rows: Some(rows),
                    }
                }
                StatementKind::Update => {
                    let rows_affected = self.executor.execute(unit, sql).await?;
                    StatementReport {
                        sql: sql.to_string(),
                        kind,
                        rows_affected: Some(rows_affected),
                        rows: None,
                    }
                }
            };
            reports.push(report);
        }

        Ok(reports)
    }
}
