//! Statement execution engine.
//!
//! This module provides statement execution with support for:
//! - Positional parameters
//! - Transaction participation through the [`ResourceRegistry`]
//! - Typed result mapping via [`RowMapper`]
//!
//! # Connection resolution
//!
//! Every operation first looks up the calling unit in the registry. A bound
//! handle is borrowed for exactly one statement and left open for the
//! transaction boundary that owns it. Otherwise a transient connection is
//! acquired and released before the operation returns, whatever the outcome.
//! The executor never releases a connection it did not acquire itself.

use crate::db::connection::Connection;
use crate::db::mapper::RowMapper;
use crate::db::pool::ConnectionSource;
use crate::db::registry::ResourceRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{LogicalUnit, Row, StatementSpec};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Executes statements on behalf of logical units.
pub struct StatementExecutor<P: ConnectionSource> {
    source: Arc<P>,
    registry: Arc<ResourceRegistry<P::Connection>>,
}

impl<P: ConnectionSource> Clone for StatementExecutor<P> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: ConnectionSource> StatementExecutor<P> {
    pub fn new(source: Arc<P>, registry: Arc<ResourceRegistry<P::Connection>>) -> Self {
        Self { source, registry }
    }

    pub fn source(&self) -> &Arc<P> {
        &self.source
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry<P::Connection>> {
        &self.registry
    }

    /// Execute a mutating statement and return the number of affected rows.
    pub async fn execute(
        &self,
        unit: &LogicalUnit,
        spec: impl Into<StatementSpec>,
    ) -> DbResult<u64> {
        let spec = spec.into();
        self.run(unit, &spec, Update).await
    }

    /// Execute a query and map every row, in order.
    pub async fn query<T, M>(
        &self,
        unit: &LogicalUnit,
        spec: impl Into<StatementSpec>,
        mapper: M,
    ) -> DbResult<Vec<T>>
    where
        M: RowMapper<T>,
    {
        let spec = spec.into();
        let rows = self.run(unit, &spec, Query).await?;
        rows.iter()
            .enumerate()
            .map(|(row_num, row)| mapper.map_row(row, row_num))
            .collect()
    }

    /// Execute a query that must return exactly one row.
    ///
    /// Zero rows is `NotFound`; more than one is `Cardinality`.
    pub async fn query_single<T, M>(
        &self,
        unit: &LogicalUnit,
        spec: impl Into<StatementSpec>,
        mapper: M,
    ) -> DbResult<T>
    where
        M: RowMapper<T>,
    {
        let spec = spec.into();
        let rows = self.run(unit, &spec, Query).await?;
        match rows.as_slice() {
            [] => Err(DbError::not_found(spec.sql())),
            [row] => mapper.map_row(row, 0),
            _ => Err(DbError::cardinality(rows.len())),
        }
    }

    /// Execute a query that returns at most one row.
    pub async fn query_optional<T, M>(
        &self,
        unit: &LogicalUnit,
        spec: impl Into<StatementSpec>,
        mapper: M,
    ) -> DbResult<Option<T>>
    where
        M: RowMapper<T>,
    {
        let spec = spec.into();
        let rows = self.run(unit, &spec, Query).await?;
        match rows.as_slice() {
            [] => Ok(None),
            [row] => mapper.map_row(row, 0).map(Some),
            _ => Err(DbError::cardinality(rows.len())),
        }
    }

    async fn run<W: Work>(
        &self,
        unit: &LogicalUnit,
        spec: &StatementSpec,
        work: W,
    ) -> DbResult<W::Output> {
        let start = Instant::now();

        // Transaction-scoped: borrow for this statement only, never release.
        if let Some(handle) = self.registry.lookup(unit) {
            debug!(
                unit = %unit,
                sql = %spec.sql(),
                params = spec.params().len(),
                transactional = true,
                "Executing statement"
            );
            let mut guard = handle.lock().await;
            let result = work.run(guard.connection_mut(), spec).await;
            drop(guard);
            return finish(unit, spec, start, result);
        }

        debug!(
            unit = %unit,
            sql = %spec.sql(),
            params = spec.params().len(),
            transactional = false,
            "Executing statement"
        );

        let mut conn = self.source.acquire().await.inspect_err(|e| {
            error!(unit = %unit, sql = %spec.sql(), error = %e, "Failed to acquire connection");
        })?;
        let result = work.run(&mut conn, spec).await;
        let released = self.source.release(conn).await;

        match released {
            Ok(()) => finish(unit, spec, start, result),
            Err(release_err) => {
                warn!(unit = %unit, error = %release_err, "Failed to release connection");
                match result {
                    // The statement error wins over the release error.
                    Err(e) => finish(unit, spec, start, Err(e)),
                    Ok(_) => Err(release_err),
                }
            }
        }
    }
}

fn finish<T>(
    unit: &LogicalUnit,
    spec: &StatementSpec,
    start: Instant,
    result: DbResult<T>,
) -> DbResult<T> {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(unit = %unit, elapsed_ms, "Statement completed"),
        Err(e) => error!(
            unit = %unit,
            sql = %spec.sql(),
            elapsed_ms,
            error = %e,
            "Statement failed"
        ),
    }
    result
}

/// The two statement shapes, run against a resolved connection.
trait Work: Send {
    type Output: Send;

    fn run<C: Connection>(
        &self,
        conn: &mut C,
        spec: &StatementSpec,
    ) -> impl Future<Output = DbResult<Self::Output>> + Send;
}

struct Update;

struct Query;

impl Work for Update {
    type Output = u64;

    async fn run<C: Connection>(&self, conn: &mut C, spec: &StatementSpec) -> DbResult<u64> {
        conn.execute_update(spec).await
    }
}

impl Work for Query {
    type Output = Vec<Row>;

    async fn run<C: Connection>(&self, conn: &mut C, spec: &StatementSpec) -> DbResult<Vec<Row>> {
        conn.execute_query(spec).await
    }
}
