//! Resource registry binding logical units to transaction-scoped connections.
//!
//! The registry is the single point where the transaction boundary publishes
//! the connection it opened and where the statement executor discovers it.
//! It never touches the physical connection itself.

use crate::error::{DbError, DbResult};
use crate::models::LogicalUnit;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One physical connection plus its bookkeeping flags.
#[derive(Debug)]
pub struct ResourceHandle<C> {
    connection: C,
    auto_committed: bool,
    bound_to_transaction: bool,
}

impl<C> ResourceHandle<C> {
    /// Wrap a connection.
    ///
    /// `auto_committed` records the mode the connection was in when acquired.
    pub fn new(connection: C, auto_committed: bool) -> Self {
        Self {
            connection,
            auto_committed,
            bound_to_transaction: false,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn auto_committed(&self) -> bool {
        self.auto_committed
    }

    pub fn is_bound_to_transaction(&self) -> bool {
        self.bound_to_transaction
    }

    pub(crate) fn set_bound_to_transaction(&mut self, bound: bool) {
        self.bound_to_transaction = bound;
    }

    pub fn into_connection(self) -> C {
        self.connection
    }
}

/// Handle shared between the owning boundary and borrowing executors.
///
/// Executors lock it for the duration of one statement only.
pub type SharedHandle<C> = Arc<tokio::sync::Mutex<ResourceHandle<C>>>;

struct Binding<C> {
    handle: SharedHandle<C>,
    created_at: Instant,
    started_at: DateTime<Utc>,
}

/// Metadata about an active binding (for listing without touching the handle).
#[derive(Debug, Clone)]
pub struct BindingMetadata {
    pub unit: LogicalUnit,
    /// When the binding was made (absolute time)
    pub started_at: DateTime<Utc>,
    /// Seconds since the binding was made
    pub duration_secs: u64,
}

/// Concurrent map from logical unit to the handle bound for it.
///
/// Sharded, so units never contend on a single global lock. No guard is ever
/// held across an `.await`.
pub struct ResourceRegistry<C> {
    bindings: DashMap<LogicalUnit, Binding<C>>,
}

impl<C> ResourceRegistry<C> {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Associate `handle` with `unit`.
    ///
    /// Fails with `AlreadyBound` if the unit already has a handle; the
    /// existing binding is left untouched.
    pub fn bind(&self, unit: &LogicalUnit, handle: SharedHandle<C>) -> DbResult<()> {
        match self.bindings.entry(unit.clone()) {
            Entry::Occupied(_) => Err(DbError::already_bound(unit.as_str())),
            Entry::Vacant(slot) => {
                slot.insert(Binding {
                    handle,
                    created_at: Instant::now(),
                    started_at: Utc::now(),
                });
                debug!(unit = %unit, "Bound resource");
                Ok(())
            }
        }
    }

    /// The handle bound to `unit`, if any.
    pub fn lookup(&self, unit: &LogicalUnit) -> Option<SharedHandle<C>> {
        self.bindings
            .get(unit)
            .map(|binding| Arc::clone(&binding.handle))
    }

    /// Remove the binding for `unit`, returning its handle.
    pub fn unbind(&self, unit: &LogicalUnit) -> Option<SharedHandle<C>> {
        let removed = self.bindings.remove(unit).map(|(_, binding)| binding.handle);
        if removed.is_some() {
            debug!(unit = %unit, "Unbound resource");
        }
        removed
    }

    pub fn is_bound(&self, unit: &LogicalUnit) -> bool {
        self.bindings.contains_key(unit)
    }

    /// Number of units currently bound.
    pub fn count(&self) -> usize {
        self.bindings.len()
    }

    /// List all active bindings with their metadata.
    pub fn list_active(&self) -> Vec<BindingMetadata> {
        self.bindings
            .iter()
            .map(|entry| BindingMetadata {
                unit: entry.key().clone(),
                started_at: entry.started_at,
                duration_secs: entry.created_at.elapsed().as_secs(),
            })
            .collect()
    }
}

impl<C> Default for ResourceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for ResourceRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("bound", &self.bindings.len())
            .finish()
    }
}
