//! Table capability tags.
//!
//! A storage backend declares, once, which of these interfaces it
//! implements; the `pushdown`/`assign_indexes` rules dispatch on the
//! resulting [`TableCapability`] tag carried on a table's catalog
//! definition, never by probing the backend with a runtime type test.

use std::fmt;
use std::sync::Arc;

use crate::expr::{Expr, LiteralValue};

use super::index::{Index, IndexLookup};

/// A table whose scan accepts a list of required column names, letting the
/// backend read only those columns.
pub trait PushdownProjectionTable: fmt::Debug + Send + Sync {}

/// A table whose scan accepts both a projection and a set of filter
/// predicates it can evaluate itself.
pub trait PushdownProjectionAndFiltersTable: fmt::Debug + Send + Sync {
    /// Of `candidates` (single-table filter conjuncts offered by
    /// `pushdown`), returns the ones this backend can evaluate internally.
    /// Accepted conjuncts are removed from the outer `Filter`.
    fn handled_filters(&self, candidates: &[Expr]) -> Vec<Expr>;
}

/// A table whose scan additionally accepts an index lookup.
pub trait IndexableTableBackend: PushdownProjectionAndFiltersTable {
    /// Builds the lookup selecting rows where `index`'s column equals
    /// `value`. `assign_indexes` (`getIndexes`) calls this once per
    /// equality/IN-member comparison it matches against a catalog index;
    /// returns `None` if this backend doesn't recognize `index.id`.
    fn lookup_for(&self, index: &Index, value: &LiteralValue) -> Option<Arc<dyn IndexLookup>>;
}

/// Tagged capability record carried on a table's catalog definition. Exactly
/// one variant applies to a given table; `pushdown`/`assign_indexes` match on
/// it to decide which wrapper plan node a scan may be rewritten into.
#[derive(Clone)]
pub enum TableCapability {
    Basic,
    ProjectionPushdown(Arc<dyn PushdownProjectionTable>),
    ProjectionAndFilterPushdown(Arc<dyn PushdownProjectionAndFiltersTable>),
    Indexable(Arc<dyn IndexableTableBackend>),
}

impl fmt::Debug for TableCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableCapability::Basic => write!(f, "Basic"),
            TableCapability::ProjectionPushdown(_) => write!(f, "ProjectionPushdown"),
            TableCapability::ProjectionAndFilterPushdown(_) => {
                write!(f, "ProjectionAndFilterPushdown")
            }
            TableCapability::Indexable(_) => write!(f, "Indexable"),
        }
    }
}

// The capability a backend advertises doesn't change once a table is
// catalogued, so equality only needs to compare which capability applies,
// not the backend instance behind it — the fixed-point-relevant state
// (which columns/filters were pushed) lives on the wrapper plan nodes.
impl PartialEq for TableCapability {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (TableCapability::Basic, TableCapability::Basic)
                | (
                    TableCapability::ProjectionPushdown(_),
                    TableCapability::ProjectionPushdown(_)
                )
                | (
                    TableCapability::ProjectionAndFilterPushdown(_),
                    TableCapability::ProjectionAndFilterPushdown(_)
                )
                | (TableCapability::Indexable(_), TableCapability::Indexable(_))
        )
    }
}
