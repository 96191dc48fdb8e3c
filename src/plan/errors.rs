use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("GetField index {index} out of range for schema of length {len}")]
    GetFieldIndexOutOfRange { index: usize, len: usize },

    #[error("invalid plan: {0}")]
    Invalid(String),
}
