//! SQL statement classification for the script runner.
//!
//! Decides whether a statement produces rows (run through `query`) or only an
//! affected-row count (run through `execute`). Uses
//! [sqlparser](https://docs.rs/sqlparser/) with the dialect of the target
//! backend, so formatting tricks cannot change the outcome.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// How a statement is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Returns rows: SELECT, SHOW, EXPLAIN, PRAGMA, and DML with RETURNING.
    Query,
    /// Returns an affected-row count: DML and DDL.
    Update,
}

mod error_messages {
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
    pub const EMPTY: &str = "Empty SQL statement";
    pub const MULTIPLE: &str =
        "Multiple statements in one --sql argument. Pass each statement separately.";
    pub const TRANSACTION: &str =
        "Transaction control statements are not allowed. Use --transactional instead.";
}

fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Classify a single SQL statement.
///
/// Rejects unparseable input, empty input, more than one statement, and
/// explicit transaction control (the transaction boundary owns it).
pub fn classify(sql: &str, db_type: DatabaseType) -> DbResult<StatementKind> {
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        DbError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    match statements.as_slice() {
        [] => Err(DbError::invalid_input(error_messages::EMPTY)),
        [stmt] => classify_statement(stmt),
        _ => Err(DbError::invalid_input(error_messages::MULTIPLE)),
    }
}

fn classify_statement(stmt: &Statement) -> DbResult<StatementKind> {
    let kind = match stmt {
        Statement::Query(_)
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. }
        | Statement::Explain { .. }
        | Statement::Pragma { .. } => StatementKind::Query,

        Statement::Insert(insert) if insert.returning.is_some() => StatementKind::Query,
        Statement::Update(update) if update.returning.is_some() => StatementKind::Query,
        Statement::Delete(delete) if delete.returning.is_some() => StatementKind::Query,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => {
            return Err(DbError::invalid_input(error_messages::TRANSACTION));
        }

        _ => StatementKind::Update,
    };
    Ok(kind)
}
