//! Index entities and the opaque index-lookup interface.
//!
//! An index lookup is produced by a catalog-registered [`Index`] and
//! identifies a (possibly lazily evaluated) set of matching rows. The
//! analyzer never inspects a lookup's internals — it only combines lookups
//! with the set operations the lookup itself exposes, and hands the result
//! to a table's `Indexable` capability. Two lookups are "mergeable" iff they
//! self-report compatibility, which in practice means "same backend".

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;

/// A stable identifier for a catalog index, used to track which indexes
/// contributed to a composed lookup (so they can all be released together).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexId(pub String);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog index entity: an expression over a table, registered under a
/// stable id. Whether the index is ready for use is tracked separately by
/// the registry (see [`super::registry::IndexRegistry`]) — an index that is
/// still being built is never returned by `index_by_expression`.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub id: IndexId,
    pub database: String,
    pub table: String,
    pub expression: Expr,
}

/// Set operations a lookup's backend may support. `assign_indexes`
/// (`getIndexes`) uses these to combine lookups across AND/OR/IN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersection,
    Difference,
}

/// An opaque handle identifying matching rows for one or more combined
/// index entries. Implementations are provided by the storage backend; the
/// analyzer only calls through this trait.
pub trait IndexLookup: fmt::Debug + Send + Sync {
    /// The backend identity this lookup originates from. Two lookups are
    /// mergeable iff `self.backend_id() == other.backend_id()`.
    fn backend_id(&self) -> &str;

    /// Indexes that contributed to this lookup, for later release.
    fn index_ids(&self) -> Vec<IndexId>;

    /// Combines `self` with `other` via `op`. Only called after
    /// `is_mergeable` returned true for the pair.
    fn combine(&self, op: SetOp, other: &dyn IndexLookup) -> Arc<dyn IndexLookup>;

    /// Whether `self` and `other` can be passed to [`IndexLookup::combine`].
    fn is_mergeable(&self, other: &dyn IndexLookup) -> bool {
        self.backend_id() == other.backend_id()
    }

    /// Enables `combine` implementations to downcast a mergeable peer back
    /// to their own concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Convenience wrapper used by the default in-memory backend ([`super::memory`])
/// and by tests: a lookup that is just a set of opaque row keys, combined by
/// ordinary set algebra on that set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetLookup {
    backend_id: String,
    index_ids: Vec<IndexId>,
    keys: Vec<String>,
}

impl KeySetLookup {
    pub fn new(backend_id: impl Into<String>, index_id: IndexId, keys: Vec<String>) -> Self {
        KeySetLookup {
            backend_id: backend_id.into(),
            index_ids: vec![index_id],
            keys,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl IndexLookup for KeySetLookup {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn index_ids(&self) -> Vec<IndexId> {
        self.index_ids.clone()
    }

    fn combine(&self, op: SetOp, other: &dyn IndexLookup) -> Arc<dyn IndexLookup> {
        let other = other
            .as_any()
            .downcast_ref::<KeySetLookup>()
            .expect("combine called on a non-mergeable lookup");

        let mut keys = match op {
            SetOp::Union => {
                let mut merged = self.keys.clone();
                for key in &other.keys {
                    if !merged.contains(key) {
                        merged.push(key.clone());
                    }
                }
                merged
            }
            SetOp::Intersection => self
                .keys
                .iter()
                .filter(|k| other.keys.contains(k))
                .cloned()
                .collect(),
            SetOp::Difference => self
                .keys
                .iter()
                .filter(|k| !other.keys.contains(k))
                .cloned()
                .collect(),
        };
        keys.sort();

        let mut index_ids = self.index_ids.clone();
        for id in &other.index_ids {
            if !index_ids.contains(id) {
                index_ids.push(id.clone());
            }
        }

        Arc::new(KeySetLookup {
            backend_id: self.backend_id.clone(),
            index_ids,
            keys,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Helper to build a union of single-key lookups, mirroring how
/// `assign_indexes` resolves `col IN (l1, ..., ln)` into one lookup with an
/// n-way union.
pub fn union_of(lookups: Vec<Arc<dyn IndexLookup>>) -> Option<Arc<dyn IndexLookup>> {
    let mut iter = lookups.into_iter();
    let first = iter.next()?;
    let mut acc = first;
    for next in iter {
        if !acc.is_mergeable(next.as_ref()) {
            return None;
        }
        acc = acc.combine(SetOp::Union, next.as_ref());
    }
    Some(acc)
}
