//! Logical unit of work identity.

use std::fmt;

/// Key identifying one line of execution.
///
/// Callers create one per task (or request) and pass it to every executor,
/// boundary and interceptor call made on behalf of that task. Distinct units
/// never share transaction state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalUnit(String);

impl LogicalUnit {
    /// Generate a fresh unit id.
    pub fn new() -> Self {
        Self(format!("unit_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LogicalUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LogicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
