//! Error types for the data-access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver failures, pool failures and row-mapping failures all belong to the
//! data-access class (see [`ErrorKind`]); the remaining variants describe misuse
//! of the transaction protocol or of single-row queries.

use thiserror::Error;

/// Boxed cause carried inside wrapped errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        suggestion: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Data access failed: {message}")]
    DataAccess {
        message: String,
        /// e.g., "23505" for a unique violation
        sql_state: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Failed to map column {column}: {message}")]
    Mapping { column: String, message: String },

    #[error("Expected exactly one row, but the query returned {actual}")]
    Cardinality { actual: usize },

    #[error("Expected exactly one row, but the query returned none: {sql}")]
    NotFound { sql: String },

    #[error("Logical unit '{unit}' already has a bound resource")]
    AlreadyBound { unit: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("{source}")]
    Application {
        #[source]
        source: BoxError,
    },
}

/// Coarse classification of [`DbError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataAccess,
    Cardinality,
    NotFound,
    AlreadyBound,
    InvalidInput,
    Internal,
    Application,
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
            source: None,
        }
    }

    /// Create a connection error that keeps the driver failure as its cause.
    pub fn connection_caused_by(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
            source: Some(source.into()),
        }
    }

    /// Create a data access error with an optional cause.
    pub fn data_access(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::DataAccess {
            message: message.into(),
            sql_state: None,
            source,
        }
    }

    /// Wrap the failure of a transactional call after its transaction was rolled back.
    pub fn rolled_back(cause: BoxError) -> Self {
        Self::DataAccess {
            message: format!("Transaction rolled back: {}", cause),
            sql_state: None,
            source: Some(cause),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a row mapping error.
    pub fn mapping(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn cardinality(actual: usize) -> Self {
        Self::Cardinality { actual }
    }

    pub fn not_found(sql: impl Into<String>) -> Self {
        Self::NotFound { sql: sql.into() }
    }

    pub fn already_bound(unit: impl Into<String>) -> Self {
        Self::AlreadyBound { unit: unit.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Convert the failure of a directly invoked call.
    ///
    /// A `DbError` passes through unchanged; anything else becomes `Application`.
    pub fn from_call<E: Into<BoxError>>(err: E) -> Self {
        match err.into().downcast::<DbError>() {
            Ok(db_err) => *db_err,
            Err(source) => Self::Application { source },
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. }
            | Self::DataAccess { .. }
            | Self::Timeout { .. }
            | Self::Mapping { .. } => ErrorKind::DataAccess,
            Self::Cardinality { .. } => ErrorKind::Cardinality,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyBound { .. } => ErrorKind::AlreadyBound,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Application { .. } => ErrorKind::Application,
        }
    }

    /// True for failures originating in the underlying store.
    pub fn is_data_access(&self) -> bool {
        self.kind() == ErrorKind::DataAccess
    }

    /// SQLSTATE reported by the driver, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let sql_state = db_err.code().map(|c| c.to_string());
                DbError::DataAccess {
                    message,
                    sql_state,
                    source: Some(Box::new(sqlx::Error::Database(db_err))),
                }
            }
            // The configured wait is only known to the pool; see `DataSource::acquire`.
            sqlx::Error::PoolTimedOut => DbError::connection_caused_by(
                "Timed out waiting for a pooled connection",
                "Raise max_connections or acquire_timeout, or shorten transactions",
                sqlx::Error::PoolTimedOut,
            ),
            sqlx::Error::PoolClosed => DbError::connection_caused_by(
                "Connection pool is closed",
                "Reconnect to the database",
                sqlx::Error::PoolClosed,
            ),
            sqlx::Error::Io(io_err) => DbError::connection_caused_by(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
                io_err,
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection_caused_by(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
                tls_err,
            ),
            err @ sqlx::Error::Protocol(_) => DbError::connection_caused_by(
                err.to_string(),
                "Check database server compatibility",
                err,
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::mapping(col.clone(), format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::mapping(index, format!("Failed to decode: {}", source))
            }
            other => DbError::DataAccess {
                message: other.to_string(),
                sql_state: None,
                source: Some(Box::new(other)),
            },
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
