//! The analyzer's error taxonomy (spec §7), wrapping [`CatalogError`] and
//! [`PlanError`] the way the teacher's `AnalyzerError` wraps `PlanCtxError`.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::plan::PlanError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("table '{0}' not found")]
    ErrTableNotFound(String),

    #[error("column '{table}.{name}' not found")]
    ErrColumnNotFound { table: String, name: String },

    #[error("column '{name}' is ambiguous: defined by tables {tables:?}")]
    ErrAmbiguousColumnName { name: String, tables: Vec<String> },

    #[error("ORDER BY position {index} is out of range for {len} output column(s)")]
    ErrOrderByColumnIndex { index: i64, len: usize },

    #[error("function '{0}' not found")]
    ErrFunctionNotFound(String),

    #[error("function '{name}' called with {actual} argument(s), expected {expected}")]
    ErrFunctionArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("analysis did not reach a fixed point within the configured iteration budget")]
    ErrMaxAnalysisIters,

    #[error("invalid plan: {0}")]
    ErrInvalidPlan(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
