//! Catalog-facing error type, wrapped by [`crate::analyzer::errors::AnalyzerError`]
//! the way the teacher's `PlanCtxError`/`GraphSchemaError` are wrapped by its
//! top-level analyzer error.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),
}
