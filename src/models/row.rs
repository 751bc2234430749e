//! Materialized result rows.

use crate::error::{DbError, DbResult};
use crate::models::value::{FromValue, Value};
use std::sync::Arc;

/// One fully decoded result row.
///
/// Column names are shared by every row of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at the given index or column name.
    pub fn value<I: ColumnIndex>(&self, index: I) -> Option<&Value> {
        index.position(self).and_then(|pos| self.values.get(pos))
    }

    /// Decode the value at the given index or column name.
    ///
    /// Names are matched exactly first, then ASCII case-insensitively.
    pub fn get<T: FromValue, I: ColumnIndex>(&self, index: I) -> DbResult<T> {
        let value = self
            .value(&index)
            .ok_or_else(|| DbError::mapping(index.describe(), "Column not found"))?;
        T::from_value(value).map_err(|message| DbError::mapping(index.describe(), message))
    }

    /// Convert this row into a JSON object keyed by column name.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// Column lookup by position or by name.
pub trait ColumnIndex {
    fn position(&self, row: &Row) -> Option<usize>;
    fn describe(&self) -> String;
}

impl ColumnIndex for usize {
    fn position(&self, row: &Row) -> Option<usize> {
        (*self < row.len()).then_some(*self)
    }

    fn describe(&self) -> String {
        format!("#{}", self)
    }
}

impl ColumnIndex for str {
    fn position(&self, row: &Row) -> Option<usize> {
        row.columns
            .iter()
            .position(|c| c == self)
            .or_else(|| row.columns.iter().position(|c| c.eq_ignore_ascii_case(self)))
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<I: ColumnIndex + ?Sized> ColumnIndex for &I {
    fn position(&self, row: &Row) -> Option<usize> {
        (**self).position(row)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
