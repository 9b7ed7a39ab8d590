//! Transform error types

use thiserror::Error;

/// Errors raised while applying a transform to a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("{transform}: missing field '{field}'")]
    MissingField { transform: &'static str, field: String },

    #[error("{transform}: field '{field}' is {actual}, expected {expected}")]
    TypeMismatch {
        transform: &'static str,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{transform}: field '{field}' has {actual} dims, needs at least {needed}")]
    ShapeMismatch {
        transform: &'static str,
        field: String,
        needed: usize,
        actual: usize,
    },
}
