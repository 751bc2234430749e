//! Data models for the data-access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod row;
pub mod statement;
pub mod unit;
pub mod value;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use row::{ColumnIndex, Row};
pub use statement::StatementSpec;
pub use unit::LogicalUnit;
pub use value::{FromValue, Value};
