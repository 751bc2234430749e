//! Transaction demarcation around a unit of work.
//!
//! A transactional call goes through `Idle → Active → Committed | RolledBack`:
//!
//! 1. Acquire a connection, switch off auto-commit and bind it to the unit.
//! 2. Run the wrapped call. Statements it issues for the same unit find the
//!    bound connection through the registry.
//! 3. Commit on success, roll back on error or panic.
//! 4. Unbind and release on every exit path.

use crate::db::{
    Connection, ConnectionSource, ResourceHandle, ResourceRegistry, SharedHandle,
    StatementExecutor,
};
use crate::error::{BoxError, DbError, DbResult};
use crate::models::LogicalUnit;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle of one transactional invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// Per-invocation transaction state. Never reused across calls.
pub struct TransactionContext<C> {
    unit: LogicalUnit,
    handle: SharedHandle<C>,
    began_at: DateTime<Utc>,
    started: Instant,
    state: TransactionState,
    guard: BindingGuard<C>,
}

impl<C> TransactionContext<C> {
    pub fn unit(&self) -> &LogicalUnit {
        &self.unit
    }

    pub fn began_at(&self) -> DateTime<Utc> {
        self.began_at
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }
}

/// Removes the binding if the transactional future is dropped mid-flight.
///
/// The connection itself is dropped with the last handle reference and never
/// goes back to the pool with its transaction open.
struct BindingGuard<C> {
    registry: Arc<ResourceRegistry<C>>,
    unit: LogicalUnit,
    armed: bool,
}

impl<C> BindingGuard<C> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C> Drop for BindingGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.registry.unbind(&self.unit).is_some() {
            warn!(
                unit = %self.unit,
                "Transactional call dropped before completion; binding removed and connection discarded"
            );
        }
    }
}

/// Begins, commits and rolls back transactions around units of work.
pub struct TransactionBoundary<P: ConnectionSource> {
    source: Arc<P>,
    registry: Arc<ResourceRegistry<P::Connection>>,
}

impl<P: ConnectionSource> Clone for TransactionBoundary<P> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: ConnectionSource> TransactionBoundary<P> {
    pub fn new(source: Arc<P>, registry: Arc<ResourceRegistry<P::Connection>>) -> Self {
        Self { source, registry }
    }

    /// Boundary sharing the executor's pool and registry.
    pub fn for_executor(executor: &StatementExecutor<P>) -> Self {
        Self::new(
            Arc::clone(executor.source()),
            Arc::clone(executor.registry()),
        )
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry<P::Connection>> {
        &self.registry
    }

    /// Run `work` inside a transaction bound to `unit`.
    ///
    /// The call's value is returned unchanged after a successful commit. Any
    /// error it returns rolls the transaction back and comes back as a
    /// data-access error wrapping the original cause; a panic is handled the
    /// same way.
    pub async fn run<T, E, F, Fut>(&self, unit: &LogicalUnit, work: F) -> DbResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let ctx = self.begin(unit).await?;

        match AssertUnwindSafe(work()).catch_unwind().await {
            Ok(Ok(value)) => {
                self.commit(ctx).await?;
                Ok(value)
            }
            Ok(Err(e)) => {
                let cause: BoxError = e.into();
                warn!(unit = %unit, error = %cause, "Transactional call failed, rolling back");
                self.rollback(ctx).await;
                Err(DbError::rolled_back(cause))
            }
            Err(panic) => {
                let panic_msg = panic_message(panic.as_ref());
                error!(
                    unit = %unit,
                    panic_msg = %panic_msg,
                    "Transactional call panicked, rolling back"
                );
                self.rollback(ctx).await;
                Err(DbError::data_access(
                    format!("Transaction rolled back: call panicked: {panic_msg}"),
                    None,
                ))
            }
        }
    }

    async fn begin(&self, unit: &LogicalUnit) -> DbResult<TransactionContext<P::Connection>> {
        // Reject nesting before taking a connection from the pool.
        if self.registry.is_bound(unit) {
            return Err(DbError::already_bound(unit.as_str()));
        }

        let mut conn = self.source.acquire().await?;
        let auto_committed = conn.is_auto_commit();
        if let Err(e) = conn.set_auto_commit(false).await {
            error!(unit = %unit, error = %e, "Failed to open transaction");
            self.release_logged(unit, conn).await;
            return Err(e);
        }

        let mut handle = ResourceHandle::new(conn, auto_committed);
        handle.set_bound_to_transaction(true);
        let handle = Arc::new(tokio::sync::Mutex::new(handle));

        if let Err(e) = self.registry.bind(unit, Arc::clone(&handle)) {
            // Lost a race with another begin for the same unit.
            if let Some(mutex) = Arc::into_inner(handle) {
                let mut conn = mutex.into_inner().into_connection();
                if let Err(rb) = conn.rollback().await {
                    warn!(unit = %unit, error = %rb, "Rollback of unbound connection failed");
                }
                self.release_logged(unit, conn).await;
            }
            return Err(e);
        }

        let began_at = Utc::now();
        info!(unit = %unit, began_at = %began_at, "Transaction started");

        Ok(TransactionContext {
            unit: unit.clone(),
            handle,
            began_at,
            started: Instant::now(),
            state: TransactionState::Active,
            guard: BindingGuard {
                registry: Arc::clone(&self.registry),
                unit: unit.clone(),
                armed: true,
            },
        })
    }

    async fn commit(&self, mut ctx: TransactionContext<P::Connection>) -> DbResult<()> {
        let committed = {
            let mut guard = ctx.handle.lock().await;
            let auto_committed = guard.auto_committed();
            let conn = guard.connection_mut();
            match conn.commit().await {
                Ok(()) => {
                    restore_auto_commit(&ctx.unit, conn, auto_committed).await;
                    Ok(())
                }
                Err(e) => {
                    error!(unit = %ctx.unit, error = %e, "Commit failed, rolling back");
                    if let Err(rb) = conn.rollback().await {
                        warn!(unit = %ctx.unit, error = %rb, "Rollback after failed commit failed");
                    }
                    Err(e)
                }
            }
        };

        ctx.state = if committed.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::RolledBack
        };
        let finished = self.finish(ctx).await;
        committed?;
        finished
    }

    async fn rollback(&self, mut ctx: TransactionContext<P::Connection>) {
        {
            let mut guard = ctx.handle.lock().await;
            let auto_committed = guard.auto_committed();
            let conn = guard.connection_mut();
            match conn.rollback().await {
                Ok(()) => restore_auto_commit(&ctx.unit, conn, auto_committed).await,
                Err(e) => error!(unit = %ctx.unit, error = %e, "Rollback failed"),
            }
        }

        ctx.state = TransactionState::RolledBack;
        // Failures are logged inside; the caller's error is the one that surfaces.
        let _ = self.finish(ctx).await;
    }

    /// Unbind and release. Runs on every completion path.
    async fn finish(&self, ctx: TransactionContext<P::Connection>) -> DbResult<()> {
        let TransactionContext {
            unit,
            handle,
            began_at,
            started,
            state,
            mut guard,
        } = ctx;

        self.registry.unbind(&unit);
        guard.disarm();

        info!(
            unit = %unit,
            state = ?state,
            began_at = %began_at,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transaction finished"
        );

        let Some(mutex) = Arc::into_inner(handle) else {
            error!(
                unit = %unit,
                "Resource handle still borrowed at transaction end; connection not released"
            );
            return Err(DbError::internal(format!(
                "Resource handle for {unit} still borrowed at transaction end"
            )));
        };

        let mut handle = mutex.into_inner();
        handle.set_bound_to_transaction(false);
        self.release_logged(&unit, handle.into_connection()).await;
        Ok(())
    }

    async fn release_logged(&self, unit: &LogicalUnit, conn: P::Connection) {
        if let Err(e) = self.source.release(conn).await {
            warn!(unit = %unit, error = %e, "Failed to release connection");
        }
    }
}

/// Put the connection back in the mode it was acquired in.
async fn restore_auto_commit<C: Connection>(
    unit: &LogicalUnit,
    conn: &mut C,
    auto_committed: bool,
) {
    if auto_committed && !conn.is_auto_commit() {
        if let Err(e) = conn.set_auto_commit(true).await {
            warn!(unit = %unit, error = %e, "Failed to restore auto-commit");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
