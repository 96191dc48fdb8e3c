//! An in-memory [`Catalog`] implementation.
//!
//! Used by this crate's own tests (unit and integration) as a fixture, and a
//! reasonable starting point for embedding this analyzer against a toy
//! storage layer. Not intended for production use — it has no persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::expr::{ComparisonKind, Expr, LiteralValue};
use crate::schema::Schema;

use super::index::{Index, IndexId, IndexLookup};
use super::registry::IndexRegistry;
use super::table_capability::{
    IndexableTableBackend, PushdownProjectionAndFiltersTable, PushdownProjectionTable,
    TableCapability,
};
use super::{Catalog, CatalogError, FunctionSignature, IndexCompletion, TableDef};

fn literal_key(value: &LiteralValue) -> Option<String> {
    match value {
        LiteralValue::Int64(v) => Some(v.to_string()),
        LiteralValue::Float64(v) => Some(v.to_string()),
        LiteralValue::Utf8(v) => Some(v.clone()),
        LiteralValue::Bool(v) => Some(v.to_string()),
        LiteralValue::Null => None,
    }
}

/// A backend fixture whose `handled_filters` accepts only equality
/// conjuncts, matching the S5 scenario in spec.md §8.
#[derive(Debug, Default)]
pub struct EqualityOnlyBackend;

impl PushdownProjectionTable for EqualityOnlyBackend {}

impl PushdownProjectionAndFiltersTable for EqualityOnlyBackend {
    fn handled_filters(&self, candidates: &[Expr]) -> Vec<Expr> {
        candidates
            .iter()
            .filter(|expr| {
                matches!(
                    expr,
                    Expr::Comparison {
                        kind: ComparisonKind::Eq,
                        ..
                    }
                )
            })
            .cloned()
            .collect()
    }
}

impl IndexableTableBackend for EqualityOnlyBackend {
    fn lookup_for(&self, index: &Index, value: &LiteralValue) -> Option<Arc<dyn IndexLookup>> {
        let key = literal_key(value)?;
        Some(single_key_lookup("memory", index.id.clone(), key))
    }
}

/// A backend fixture that accepts every single-table conjunct offered to it.
#[derive(Debug, Default)]
pub struct AcceptAllBackend;

impl PushdownProjectionTable for AcceptAllBackend {}

impl PushdownProjectionAndFiltersTable for AcceptAllBackend {
    fn handled_filters(&self, candidates: &[Expr]) -> Vec<Expr> {
        candidates.to_vec()
    }
}

impl IndexableTableBackend for AcceptAllBackend {
    fn lookup_for(&self, index: &Index, value: &LiteralValue) -> Option<Arc<dyn IndexLookup>> {
        let key = literal_key(value)?;
        Some(single_key_lookup("memory", index.id.clone(), key))
    }
}

#[derive(Default)]
struct MemoryDatabase {
    tables: HashMap<String, Arc<TableDef>>,
}

/// A `Catalog` backed entirely by in-process `HashMap`s plus an
/// [`IndexRegistry`] for asynchronous index availability.
#[derive(Default)]
pub struct MemoryCatalog {
    databases: RwLock<HashMap<String, MemoryDatabase>>,
    functions: RwLock<HashMap<String, FunctionSignature>>,
    index_registry: IndexRegistry,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        MemoryCatalog::default()
    }

    pub fn with_database(self, name: impl Into<String>) -> Self {
        self.databases
            .write()
            .expect("catalog lock poisoned")
            .entry(name.into())
            .or_default();
        self
    }

    pub fn with_table(
        self,
        database: impl Into<String>,
        name: impl Into<String>,
        schema: Schema,
        capability: TableCapability,
    ) -> Self {
        let database = database.into();
        let name = name.into();
        let def = Arc::new(TableDef {
            database: database.clone(),
            name: name.clone(),
            schema,
            capability,
        });
        self.databases
            .write()
            .expect("catalog lock poisoned")
            .entry(database)
            .or_default()
            .tables
            .insert(name, def);
        self
    }

    pub fn with_function(self, name: impl Into<String>, arity: usize) -> Self {
        let name = name.into();
        self.functions
            .write()
            .expect("catalog lock poisoned")
            .insert(
                name.clone(),
                FunctionSignature { name, arity },
            );
        self
    }

    pub fn index_registry(&self) -> &IndexRegistry {
        &self.index_registry
    }
}

impl Catalog for MemoryCatalog {
    fn databases(&self) -> Vec<String> {
        self.databases
            .read()
            .expect("catalog lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn database(&self, name: &str) -> Result<(), CatalogError> {
        if self
            .databases
            .read()
            .expect("catalog lock poisoned")
            .contains_key(name)
        {
            Ok(())
        } else {
            Err(CatalogError::DatabaseNotFound(name.to_string()))
        }
    }

    fn table(&self, database: &str, name: &str) -> Result<Arc<TableDef>, CatalogError> {
        self.databases
            .read()
            .expect("catalog lock poisoned")
            .get(database)
            .and_then(|db| db.tables.get(name))
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    fn function(&self, name: &str) -> Result<FunctionSignature, CatalogError> {
        self.functions
            .read()
            .expect("catalog lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::FunctionNotFound(name.to_string()))
    }

    fn indexes_by_table(&self, database: &str, table: &str) -> Vec<Index> {
        self.index_registry.indexes_by_table(database, table)
    }

    fn index_by_expression(&self, database: &str, expr: &Expr) -> Option<Index> {
        self.index_registry.index_by_expression(database, expr)
    }

    fn add_index(&self, index: Index) -> IndexCompletion {
        self.index_registry.add_index(index)
    }

    fn release_index(&self, id: &IndexId) {
        self.index_registry.release_index(id);
    }
}

/// Builds a ready-to-use lookup for an equality predicate on a single
/// column, as `assign_indexes` would expect a backend's index to produce.
pub fn single_key_lookup(backend_id: &str, index_id: IndexId, key: impl Into<String>) -> Arc<dyn IndexLookup> {
    Arc::new(super::index::KeySetLookup::new(
        backend_id,
        index_id,
        vec![key.into()],
    ))
}
