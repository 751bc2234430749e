//! Call interception: route matched calls through the transaction boundary.
//!
//! [`Intercepted`] is the decorator value. A capability trait is implemented
//! for it by forwarding every method through [`Intercepted::invoke`] with the
//! method's [`CallMetadata`]:
//!
//! ```ignore
//! const TRANSFER: CallMetadata = CallMetadata::new("AccountService", "transfer")
//!     .with_method_markers(&[Marker::Transactional]);
//!
//! impl<P: ConnectionSource, M: Matcher> AccountService for Intercepted<Accounts<P>, P, M> {
//!     async fn transfer(&self, unit: &LogicalUnit, from: i64, to: i64, amount: i64) -> DbResult<()> {
//!         self.invoke(&TRANSFER, unit, |target| target.transfer(unit, from, to, amount))
//!             .await
//!     }
//! }
//! ```

use crate::db::ConnectionSource;
use crate::error::{BoxError, DbError, DbResult};
use crate::models::LogicalUnit;
use crate::tx::boundary::TransactionBoundary;
use crate::tx::matcher::{CallMetadata, Matcher};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Composes a [`Matcher`] with a [`TransactionBoundary`].
pub struct CallInterceptor<P: ConnectionSource, M> {
    matcher: M,
    boundary: TransactionBoundary<P>,
}

impl<P: ConnectionSource, M: Matcher> CallInterceptor<P, M> {
    pub fn new(matcher: M, boundary: TransactionBoundary<P>) -> Self {
        Self { matcher, boundary }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn boundary(&self) -> &TransactionBoundary<P> {
        &self.boundary
    }

    /// Invoke `proceed`, inside a transaction if the matcher accepts `call`.
    ///
    /// Unmatched calls never touch the registry; their `DbError`s pass
    /// through unchanged and other errors become `Application` errors.
    pub async fn intercept<T, E, F, Fut>(
        &self,
        call: &CallMetadata,
        unit: &LogicalUnit,
        proceed: F,
    ) -> DbResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        if self.matcher.matches(call) {
            debug!(
                unit = %unit,
                type_name = call.type_name,
                method_name = call.method_name,
                "Routing call through transaction boundary"
            );
            self.boundary.run(unit, proceed).await
        } else {
            debug!(
                unit = %unit,
                type_name = call.type_name,
                method_name = call.method_name,
                "Invoking call directly"
            );
            proceed().await.map_err(DbError::from_call)
        }
    }
}

/// Decorator holding the real implementation and a shared interceptor.
pub struct Intercepted<S, P: ConnectionSource, M> {
    target: S,
    interceptor: Arc<CallInterceptor<P, M>>,
}

impl<S, P: ConnectionSource, M: Matcher> Intercepted<S, P, M> {
    pub fn new(target: S, interceptor: Arc<CallInterceptor<P, M>>) -> Self {
        Self {
            target,
            interceptor,
        }
    }

    /// The wrapped implementation, bypassing interception.
    pub fn target(&self) -> &S {
        &self.target
    }

    pub fn interceptor(&self) -> &Arc<CallInterceptor<P, M>> {
        &self.interceptor
    }

    /// Forward one capability method to the target through the interceptor.
    pub async fn invoke<'a, T, E, F, Fut>(
        &'a self,
        call: &CallMetadata,
        unit: &LogicalUnit,
        f: F,
    ) -> DbResult<T>
    where
        F: FnOnce(&'a S) -> Fut,
        Fut: Future<Output = Result<T, E>> + 'a,
        E: Into<BoxError>,
    {
        let target = &self.target;
        self.interceptor.intercept(call, unit, || f(target)).await
    }
}
