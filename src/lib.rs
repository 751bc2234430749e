//! DB Template Library
//!
//! A data-access layer for SQL databases (SQLite, PostgreSQL, MySQL):
//! statement execution on pooled connections, declarative transaction
//! boundaries keyed by logical unit, and call interception that routes
//! marked calls through those boundaries.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod tools;
pub mod tx;

pub use config::Config;
pub use db::{DataSource, StatementExecutor};
pub use error::{DbError, DbResult};
pub use models::LogicalUnit;
pub use tx::{CallInterceptor, TransactionBoundary};
