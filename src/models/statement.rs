//! Statement specifications.

use crate::models::value::Value;
use serde::{Deserialize, Serialize};

/// SQL text plus its ordered, positional bind parameters.
///
/// A plain value: it has no identity and is never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSpec {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

impl StatementSpec {
    pub fn new<I>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl From<&str> for StatementSpec {
    fn from(sql: &str) -> Self {
        Self::new(sql, Vec::<Value>::new())
    }
}

impl From<String> for StatementSpec {
    fn from(sql: String) -> Self {
        Self::new(sql, Vec::<Value>::new())
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for StatementSpec {
    fn from((sql, params): (S, Vec<Value>)) -> Self {
        Self::new(sql, params)
    }
}

impl std::fmt::Display for StatementSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}
