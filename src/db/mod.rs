//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management and the connection seams
//! - Statement execution with transaction participation
//! - The resource registry binding units to connections
//! - Row mapping and type mappings
//! - Macros for parameter lists and database dispatch

pub mod macros;
pub mod connection;
pub mod executor;
pub mod mapper;
pub mod params;
pub mod pool;
pub mod registry;
pub mod types;

pub use connection::{Connection, DbConnection, PooledConnection};
pub use executor::StatementExecutor;
pub use mapper::{JsonRowMapper, RowMapper, ScalarMapper, scalar};
pub use pool::{ConnectionSource, DataSource, DbPool};
pub use registry::{BindingMetadata, ResourceHandle, ResourceRegistry, SharedHandle};
