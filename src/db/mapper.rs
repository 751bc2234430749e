//! Row-to-value conversion.

use crate::error::DbResult;
use crate::models::{FromValue, Row};
use std::marker::PhantomData;

/// Maps one result row to a value.
///
/// `row_num` is the zero-based position of the row in its result set.
pub trait RowMapper<T> {
    fn map_row(&self, row: &Row, row_num: usize) -> DbResult<T>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row, usize) -> DbResult<T>,
{
    fn map_row(&self, row: &Row, row_num: usize) -> DbResult<T> {
        self(row, row_num)
    }
}

/// Mapper reading the first column of each row.
pub struct ScalarMapper<T>(PhantomData<fn() -> T>);

impl<T: FromValue> RowMapper<T> for ScalarMapper<T> {
    fn map_row(&self, row: &Row, _row_num: usize) -> DbResult<T> {
        row.get(0usize)
    }
}

/// Mapper reading the first column of each row as `T`.
pub fn scalar<T: FromValue>() -> ScalarMapper<T> {
    ScalarMapper(PhantomData)
}

/// Maps each row to a JSON object keyed by column name.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowMapper;

impl RowMapper<serde_json::Map<String, serde_json::Value>> for JsonRowMapper {
    fn map_row(
        &self,
        row: &Row,
        _row_num: usize,
    ) -> DbResult<serde_json::Map<String, serde_json::Value>> {
        Ok(row.to_json_map())
    }
}
