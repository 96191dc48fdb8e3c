//! Per-query analysis context.
//!
//! A [`Context`] is cheap to create and carries nothing that must outlive a
//! single `Analyzer::analyze` call except a shared cancellation flag, which
//! the caller may set from another thread to abort the next pipeline pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Carries the session, current database, and cancellation signal for one
/// `analyze` invocation. Analysis is a pure function of `(Context, Catalog,
/// LogicalPlan)`; a `Context` may be reused concurrently from many threads,
/// each analyzing a different plan.
#[derive(Clone)]
pub struct Context {
    session_id: String,
    current_database: String,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new(session_id: impl Into<String>, current_database: impl Into<String>) -> Self {
        Context {
            session_id: session_id.into(),
            current_database: current_database.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_database(&self) -> &str {
        &self.current_database
    }

    pub fn with_current_database(mut self, database: impl Into<String>) -> Self {
        self.current_database = database.into();
        self
    }

    /// Signals cancellation. Checked by the rule pipeline driver between
    /// iterations, never mid-rule.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
