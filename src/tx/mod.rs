//! Declarative transaction demarcation.
//!
//! This module provides:
//! - `boundary`: begin/commit/rollback around a unit of work
//! - `matcher`: call metadata, markers and matching predicates
//! - `interceptor`: the call interceptor and the `Intercepted` decorator

pub mod boundary;
pub mod interceptor;
pub mod matcher;

pub use boundary::{TransactionBoundary, TransactionContext, TransactionState};
pub use interceptor::{CallInterceptor, Intercepted};
pub use matcher::{
    CachingMatcher, CallMetadata, Marker, MarkerMatcher, Matcher, MethodNameMatcher,
};
