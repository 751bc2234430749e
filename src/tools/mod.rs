//! Command-line tooling built on the data-access layer.
//!
//! - `sql_classifier`: decides whether a statement is a query or an update
//! - `script`: runs a statement list, optionally as one transactional call

pub mod script;
pub mod sql_classifier;

pub use script::{ScriptRunner, StatementReport};
pub use sql_classifier::{StatementKind, classify};
