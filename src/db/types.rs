//! Database-agnostic type mappings.
//!
//! This module converts database-specific rows into [`Row`] values.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its rows are classified from the runtime
//! storage class of each value rather than from the declared column type.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Row, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};
use std::sync::Arc;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Integer types ("interval" and "point" also contain "int")
    if (lower.contains("int") && lower != "interval" && lower != "point")
        || lower.contains("serial")
        || lower == "year"
    {
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // TIME, TIMETZ, TIMESTAMP, TIMESTAMPTZ
    if lower.starts_with("time") || lower == "datetime" || lower == "date" {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Decoding of a driver row into column names and [`Value`]s.
pub trait DecodeRow {
    fn column_names(&self) -> Vec<String>;

    /// Decode every column. A non-NULL value the decoder cannot represent is
    /// a [`DbError::Mapping`] naming the column, never a NULL.
    fn decode_values(&self) -> DbResult<Vec<Value>>;
}

/// Decode a materialized result set, sharing the column names between rows.
pub fn decode_rows<R: DecodeRow>(rows: &[R]) -> DbResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first.column_names().into();
    rows.iter()
        .map(|r| Ok(Row::new(Arc::clone(&columns), r.decode_values()?)))
        .collect()
}

fn decode_error<C: Column>(col: &C, err: sqlx::Error) -> DbError {
    DbError::mapping(
        col.name(),
        format!("cannot decode {} value: {}", col.type_info().name(), err),
    )
}

impl DecodeRow for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> DbResult<Vec<Value>> {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                mysql::decode_column(self, col.ordinal(), category)
                    .map_err(|e| decode_error(col, e))
            })
            .collect()
    }
}

impl DecodeRow for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> DbResult<Vec<Value>> {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                postgres::decode_column(self, col.ordinal(), category)
                    .map_err(|e| decode_error(col, e))
            })
            .collect()
    }
}

impl DecodeRow for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> DbResult<Vec<Value>> {
        self.columns()
            .iter()
            .map(|col| {
                sqlite::decode_column(self, col.ordinal()).map_err(|e| decode_error(col, e))
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================
//
// Each decoder tries the Rust types its category admits, widest first, and
// returns the driver error of the last attempt when none fits. NULL is
// detected up front so the typed attempts never see it.

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        if category == TypeCategory::Null || row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }
        match category {
            TypeCategory::Decimal => Ok(Value::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).map(Value::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            TypeCategory::Json => row
                .try_get::<serde_json::Value, _>(idx)
                .map(|v| Value::String(v.to_string())),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => row.try_get::<String, _>(idx).map(Value::String),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        // u64 beyond i64::MAX keeps its exact textual form
        let v = row.try_get::<u64, _>(idx)?;
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        row.try_get::<f32, _>(idx).map(|v| Value::Float(v.into()))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
            return Ok(Value::String(v.to_string()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
            return Ok(Value::String(v.to_string()));
        }
        row.try_get::<chrono::NaiveTime, _>(idx)
            .map(|v| Value::String(v.to_string()))
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::types::PgTimeTz;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        if category == TypeCategory::Null || row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }
        match category {
            TypeCategory::Decimal => Ok(Value::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).map(Value::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            TypeCategory::Json => row
                .try_get::<serde_json::Value, _>(idx)
                .map(|v| Value::String(v.to_string())),
            TypeCategory::Uuid => row
                .try_get::<uuid::Uuid, _>(idx)
                .map(|v| Value::String(v.to_string())),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => row.try_get::<String, _>(idx).map(Value::String),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        row.try_get::<i16, _>(idx).map(|v| Value::Int(v.into()))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        row.try_get::<f32, _>(idx).map(|v| Value::Float(v.into()))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
            return Ok(Value::String(v.to_rfc3339()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
            return Ok(Value::String(v.to_string()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
            return Ok(Value::String(v.to_string()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
            return Ok(Value::String(v.to_string()));
        }
        row.try_get::<PgTimeTz<chrono::NaiveTime, chrono::FixedOffset>, _>(idx)
            .map(|v| Value::String(format!("{}{}", v.time, v.offset)))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let storage_class = raw.type_info().name().to_string();

        match categorize_type(&storage_class, DatabaseType::SQLite) {
            TypeCategory::Integer | TypeCategory::Boolean => {
                row.try_get::<i64, _>(idx).map(Value::Int)
            }
            TypeCategory::Float | TypeCategory::Decimal => {
                row.try_get::<f64, _>(idx).map(Value::Float)
            }
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            _ => row.try_get::<String, _>(idx).map(Value::String),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_misc() {
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::PostgreSQL),
            TypeCategory::Boolean
        );
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("BLOB", DatabaseType::SQLite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("TEXT", DatabaseType::SQLite),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Null
        );
    }

    #[test]
    fn test_categorize_type_time_and_year() {
        assert_eq!(
            categorize_type("TIME", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("TIMETZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("TIME", DatabaseType::MySQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("YEAR", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYTEXT", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("POINT", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_decode_rows_empty() {
        let rows: Vec<SqliteRow> = Vec::new();
        assert!(decode_rows(&rows).unwrap().is_empty());
    }

    async fn sqlite_rows(sql: &str) -> Vec<SqliteRow> {
        use sqlx::Connection as _;

        let mut conn = sqlx::SqliteConnection::connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(sql).fetch_all(&mut conn).await.unwrap()
    }

    #[tokio::test]
    async fn test_decode_sqlite_storage_classes() {
        let rows =
            sqlite_rows("SELECT 1 AS i, 2.5 AS f, 'a' AS t, x'0102' AS b, NULL AS n").await;
        let decoded = decode_rows(&rows).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].get::<Value, _>("i").unwrap(), Value::Int(1));
        assert_eq!(decoded[0].get::<Value, _>("f").unwrap(), Value::Float(2.5));
        assert_eq!(
            decoded[0].get::<Value, _>("t").unwrap(),
            Value::String("a".to_string())
        );
        assert_eq!(
            decoded[0].get::<Value, _>("b").unwrap(),
            Value::Bytes(vec![1, 2])
        );
        assert_eq!(decoded[0].get::<Value, _>("n").unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_mapping_error() {
        // TEXT storage holding bytes that are not UTF-8.
        let rows = sqlite_rows("SELECT 1 AS ok, CAST(x'ff' AS TEXT) AS broken").await;
        let err = decode_rows(&rows).unwrap_err();

        match &err {
            DbError::Mapping { column, message } => {
                assert_eq!(column, "broken");
                assert!(message.contains("cannot decode"), "{message}");
            }
            other => panic!("expected a mapping error, got {other:?}"),
        }
        assert!(err.is_data_access());
    }
}
