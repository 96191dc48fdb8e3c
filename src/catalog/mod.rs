//! Catalog & index registry: the name-resolution surface consulted by every
//! resolution rule.
//!
//! A [`Catalog`] answers, from in-memory snapshots only (no I/O in the hot
//! path, per §5), questions about what databases/tables/functions/indexes
//! exist. Implementations outlive any single `Analyzer::analyze` call; the
//! in-memory reference implementation used by this crate's own tests lives
//! in [`memory`].

pub mod errors;
pub mod index;
pub mod memory;
pub mod registry;
pub mod release;
pub mod table_capability;

use std::sync::Arc;

use crate::expr::Expr;
use crate::schema::Schema;

pub use errors::CatalogError;
pub use index::{Index, IndexId, IndexLookup, SetOp};
pub use registry::IndexCompletion;
pub use release::ReleaseGuard;
pub use table_capability::{
    IndexableTableBackend, PushdownProjectionAndFiltersTable, PushdownProjectionTable,
    TableCapability,
};

/// A table as known to the catalog: its schema and the pushdown/index
/// capability its storage backend advertises.
#[derive(Clone)]
pub struct TableDef {
    pub database: String,
    pub name: String,
    pub schema: Schema,
    pub capability: TableCapability,
}

impl PartialEq for TableDef {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.name == other.name
            && self.schema == other.schema
            && self.capability == other.capability
    }
}

impl std::fmt::Debug for TableDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDef")
            .field("database", &self.database)
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish()
    }
}

/// A catalog-registered scalar function's signature. Evaluation is out of
/// scope; `resolve_functions` confirms a name is registered, checks `arity`
/// against the call site's argument count, and binds the resolved
/// expression to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub arity: usize,
}

/// The name-resolution surface consumed by the analyzer. See §6.
pub trait Catalog: Send + Sync {
    fn databases(&self) -> Vec<String>;

    fn database(&self, name: &str) -> Result<(), CatalogError>;

    fn table(&self, database: &str, name: &str) -> Result<Arc<TableDef>, CatalogError>;

    fn function(&self, name: &str) -> Result<FunctionSignature, CatalogError>;

    fn indexes_by_table(&self, database: &str, table: &str) -> Vec<Index>;

    fn index_by_expression(&self, database: &str, expr: &Expr) -> Option<Index>;

    fn add_index(&self, index: Index) -> IndexCompletion;

    fn release_index(&self, id: &IndexId);
}
