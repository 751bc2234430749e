//! Call metadata and the predicates deciding transactional wrapping.

use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// Declarative marker attached to a capability type or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Calls carrying this marker run inside a transaction.
    Transactional,
    Custom(&'static str),
}

/// Static description of one capability method.
///
/// Declared as a constant next to the capability trait:
///
/// ```
/// use db_template::tx::{CallMetadata, Marker};
///
/// const TRANSFER: CallMetadata = CallMetadata::new("AccountService", "transfer")
///     .with_method_markers(&[Marker::Transactional]);
///
/// assert!(TRANSFER.has_marker(&Marker::Transactional));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallMetadata {
    pub type_name: &'static str,
    pub method_name: &'static str,
    pub type_markers: &'static [Marker],
    pub method_markers: &'static [Marker],
}

impl CallMetadata {
    pub const fn new(type_name: &'static str, method_name: &'static str) -> Self {
        Self {
            type_name,
            method_name,
            type_markers: &[],
            method_markers: &[],
        }
    }

    /// Markers declared on the type; they apply to every method.
    pub const fn with_type_markers(mut self, markers: &'static [Marker]) -> Self {
        self.type_markers = markers;
        self
    }

    pub const fn with_method_markers(mut self, markers: &'static [Marker]) -> Self {
        self.method_markers = markers;
        self
    }

    /// Whether the method or its declaring type carries `marker`.
    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.method_markers.contains(marker) || self.type_markers.contains(marker)
    }
}

/// Predicate over call metadata. Must be deterministic.
pub trait Matcher: Send + Sync {
    fn matches(&self, call: &CallMetadata) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&CallMetadata) -> bool + Send + Sync,
{
    fn matches(&self, call: &CallMetadata) -> bool {
        self(call)
    }
}

/// Matches calls whose method or declaring type carries a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatcher {
    marker: Marker,
}

impl MarkerMatcher {
    pub fn new(marker: Marker) -> Self {
        Self { marker }
    }

    /// The `Transactional` marker rule.
    pub fn transactional() -> Self {
        Self::new(Marker::Transactional)
    }
}

impl Default for MarkerMatcher {
    fn default() -> Self {
        Self::transactional()
    }
}

impl Matcher for MarkerMatcher {
    fn matches(&self, call: &CallMetadata) -> bool {
        call.has_marker(&self.marker)
    }
}

/// Matches explicitly listed types and methods.
#[derive(Debug, Clone, Default)]
pub struct MethodNameMatcher {
    types: HashSet<String>,
    methods: HashSet<(String, String)>,
}

impl MethodNameMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match every method of `type_name`.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.insert(type_name.into());
        self
    }

    pub fn with_method(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        self.methods.insert((type_name.into(), method_name.into()));
        self
    }
}

impl Matcher for MethodNameMatcher {
    fn matches(&self, call: &CallMetadata) -> bool {
        self.types.contains(call.type_name)
            || self
                .methods
                .contains(&(call.type_name.to_string(), call.method_name.to_string()))
    }
}

/// Memoizes another matcher's decision per `(type, method)`.
///
/// Valid because call metadata is immutable once declared.
pub struct CachingMatcher<M> {
    inner: M,
    decisions: DashMap<(&'static str, &'static str), bool>,
}

impl<M: Matcher> CachingMatcher<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            decisions: DashMap::new(),
        }
    }

    /// Number of cached decisions.
    pub fn cached(&self) -> usize {
        self.decisions.len()
    }
}

impl<M: Matcher> Matcher for CachingMatcher<M> {
    fn matches(&self, call: &CallMetadata) -> bool {
        let key = (call.type_name, call.method_name);
        if let Some(decision) = self.decisions.get(&key) {
            return *decision;
        }
        let decision = self.inner.matches(call);
        debug!(
            type_name = call.type_name,
            method_name = call.method_name,
            decision,
            "Cached matcher decision"
        );
        self.decisions.insert(key, decision);
        decision
    }
}
