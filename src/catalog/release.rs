//! Resource cleanup for index lookups used by a resolved plan.
//!
//! An `IndexableTable` carrier may hold a composite lookup built from
//! several catalog indexes (§4.15). Spec §5 requires that, when the
//! executor (out of scope) eventually drops the plan, any release callback
//! the catalog attached to those indexes fires exactly once. `ReleaseGuard`
//! is the RAII wrapper that guarantees that without requiring the executor
//! to remember to call anything.

use std::fmt;
use std::sync::Mutex;

/// Wraps an optional `FnOnce` cleanup callback; `Drop` invokes it at most
/// once. Cloned `Arc<ReleaseGuard>` handles (e.g. if a rule shares one
/// guard across several upstream references to the same table) all share
/// the same underlying callback slot, so the callback still only fires once
/// total, not once per clone.
pub struct ReleaseGuard {
    release: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ReleaseGuard {
    pub fn new(release: Box<dyn FnOnce() + Send>) -> Self {
        ReleaseGuard {
            release: Mutex::new(Some(release)),
        }
    }

    /// A guard with nothing to release — used when a backend's lookup
    /// carries no cleanup obligation.
    pub fn noop() -> Self {
        ReleaseGuard {
            release: Mutex::new(None),
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.lock().expect("release guard lock poisoned").take() {
            release();
        }
    }
}

impl fmt::Debug for ReleaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseGuard").finish_non_exhaustive()
    }
}
