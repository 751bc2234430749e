//! Physical connections and the statement-level driver interface.
//!
//! [`Connection`] is the seam between the coordination layer (executor,
//! registry, transaction boundary) and the driver. [`DbConnection`] is the
//! `sqlx` implementation backed by a pooled connection per backend.
//!
//! # Auto-commit
//!
//! `sqlx` has no auto-commit switch, so it is emulated: turning auto-commit
//! off issues the backend's begin statement, and `commit`/`rollback` end the
//! open transaction and return the connection to auto-commit mode. A
//! connection dropped with an open transaction is detached from its pool and
//! closed, so the pool never hands out a connection mid-transaction.

use crate::db::macros::impl_db_dispatch;
use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::types::decode_rows;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Row, StatementSpec};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, Postgres, Sqlite};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A physical connection as seen by the coordination layer.
///
/// Parameter binding and cursor handling are folded into the two execute
/// operations: statements are prepared, bound positionally and fully drained
/// in one call.
pub trait Connection: Send + 'static {
    fn db_type(&self) -> DatabaseType;

    /// Whether each statement currently commits on its own.
    fn is_auto_commit(&self) -> bool;

    /// Switch auto-commit mode.
    ///
    /// Turning it off opens a transaction; turning it back on while a
    /// transaction is open commits that transaction.
    fn set_auto_commit(&mut self, auto_commit: bool) -> impl Future<Output = DbResult<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Execute a mutating statement and return the number of affected rows.
    fn execute_update(
        &mut self,
        spec: &StatementSpec,
    ) -> impl Future<Output = DbResult<u64>> + Send;

    /// Execute a query and return every row, materialized.
    fn execute_query(
        &mut self,
        spec: &StatementSpec,
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;
}

/// Database-specific pooled connection (avoids AnyConnection limitations).
#[derive(Debug)]
pub enum PooledConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl PooledConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            PooledConnection::MySql(_) => DatabaseType::MySQL,
            PooledConnection::Postgres(_) => DatabaseType::PostgreSQL,
            PooledConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// `sqlx`-backed [`Connection`] checked out of a [`DataSource`](crate::db::DataSource).
#[derive(Debug)]
pub struct DbConnection {
    inner: Option<PooledConnection>,
    db_type: DatabaseType,
    auto_commit: bool,
    statement_timeout: Duration,
}

impl DbConnection {
    pub(crate) fn new(conn: PooledConnection, statement_timeout: Duration) -> Self {
        Self {
            db_type: conn.db_type(),
            inner: Some(conn),
            auto_commit: true,
            statement_timeout,
        }
    }

    fn live(&mut self) -> DbResult<&mut PooledConnection> {
        self.inner
            .as_mut()
            .ok_or_else(|| DbError::internal("Connection used after it was detached"))
    }

    /// Run a transaction-control statement (BEGIN/COMMIT/ROLLBACK).
    async fn run_control(&mut self, sql: &'static str) -> DbResult<()> {
        let statement_timeout = self.statement_timeout;
        let conn = self.live()?;

        let fut = async move {
            use sqlx::Executor;
            impl_db_dispatch!(PooledConnection, conn, {
                MySql(c) => (&mut **c).execute(sql).await.map(|_| ()),
                Postgres(c) => (&mut **c).execute(sql).await.map(|_| ()),
                SQLite(c) => (&mut **c).execute(sql).await.map(|_| ()),
            })
        };

        match timeout(statement_timeout, fut).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error(sql, statement_timeout)),
        }
    }
}

impl Connection for DbConnection {
    fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        match (self.auto_commit, auto_commit) {
            (true, false) => {
                self.run_control(self.db_type.begin_statement()).await?;
                self.auto_commit = false;
                debug!(db_type = %self.db_type, "Transaction opened");
                Ok(())
            }
            (false, true) => self.commit().await,
            _ => Ok(()),
        }
    }

    async fn commit(&mut self) -> DbResult<()> {
        if self.auto_commit {
            return Err(DbError::invalid_input(
                "Cannot commit: connection is in auto-commit mode",
            ));
        }
        self.run_control("COMMIT").await?;
        self.auto_commit = true;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if self.auto_commit {
            return Err(DbError::invalid_input(
                "Cannot roll back: connection is in auto-commit mode",
            ));
        }
        self.run_control("ROLLBACK").await?;
        self.auto_commit = true;
        Ok(())
    }

    async fn execute_update(&mut self, spec: &StatementSpec) -> DbResult<u64> {
        let statement_timeout = self.statement_timeout;
        let conn = self.live()?;

        let fut = async move {
            impl_db_dispatch!(PooledConnection, conn, {
                MySql(c) => mysql::execute_update(c, spec).await,
                Postgres(c) => postgres::execute_update(c, spec).await,
                SQLite(c) => sqlite::execute_update(c, spec).await,
            })
        };

        match timeout(statement_timeout, fut).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("statement execution", statement_timeout)),
        }
    }

    async fn execute_query(&mut self, spec: &StatementSpec) -> DbResult<Vec<Row>> {
        let statement_timeout = self.statement_timeout;
        let conn = self.live()?;

        let fut = async move {
            impl_db_dispatch!(PooledConnection, conn, {
                MySql(c) => mysql::fetch_rows(c, spec).await,
                Postgres(c) => postgres::fetch_rows(c, spec).await,
                SQLite(c) => sqlite::fetch_rows(c, spec).await,
            })
        };

        match timeout(statement_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error("query execution", statement_timeout)),
        }
    }
}

impl Drop for DbConnection {
    fn drop(&mut self) {
        if self.auto_commit {
            return;
        }
        let Some(conn) = self.inner.take() else {
            return;
        };

        warn!(
            db_type = %self.db_type,
            "Connection dropped with an open transaction, closing it instead of returning it to the pool"
        );
        // The detached connection closes when dropped; the server rolls back.
        impl_db_dispatch!(PooledConnection, conn, {
            MySql(c) => drop(c.detach()),
            Postgres(c) => drop(c.detach()),
            SQLite(c) => drop(c.detach()),
        })
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// Statements without parameters run as raw SQL to avoid prepared statement
// issues (some SQL like CREATE PROCEDURE doesn't support prepared statements).

mod mysql {
    use super::*;
    use sqlx::MySqlConnection;

    pub async fn execute_update(
        conn: &mut MySqlConnection,
        spec: &StatementSpec,
    ) -> Result<u64, sqlx::Error> {
        let result = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.execute(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_mysql_param(query, param);
            }
            query.execute(conn).await?
        };
        Ok(result.rows_affected())
    }

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        spec: &StatementSpec,
    ) -> DbResult<Vec<Row>> {
        let rows = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.fetch_all(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_mysql_param(query, param);
            }
            query.fetch_all(conn).await?
        };
        decode_rows(&rows)
    }
}

mod postgres {
    use super::*;
    use sqlx::PgConnection;

    pub async fn execute_update(
        conn: &mut PgConnection,
        spec: &StatementSpec,
    ) -> Result<u64, sqlx::Error> {
        let result = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.execute(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_postgres_param(query, param);
            }
            query.execute(conn).await?
        };
        Ok(result.rows_affected())
    }

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        spec: &StatementSpec,
    ) -> DbResult<Vec<Row>> {
        let rows = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.fetch_all(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_postgres_param(query, param);
            }
            query.fetch_all(conn).await?
        };
        decode_rows(&rows)
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;

    pub async fn execute_update(
        conn: &mut SqliteConnection,
        spec: &StatementSpec,
    ) -> Result<u64, sqlx::Error> {
        let result = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.execute(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_sqlite_param(query, param);
            }
            query.execute(conn).await?
        };
        Ok(result.rows_affected())
    }

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        spec: &StatementSpec,
    ) -> DbResult<Vec<Row>> {
        let rows = if spec.params().is_empty() {
            use sqlx::Executor;
            conn.fetch_all(spec.sql()).await?
        } else {
            let mut query = sqlx::query(spec.sql());
            for param in spec.params() {
                query = bind_sqlite_param(query, param);
            }
            query.fetch_all(conn).await?
        };
        decode_rows(&rows)
    }
}
