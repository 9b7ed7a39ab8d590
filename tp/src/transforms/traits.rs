//! DataTransform trait definition

use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use super::error::TransformError;
use crate::record::{Array, Record, Value};

/// A stateless function over one record
///
/// Parameters are fixed at construction, so a transform can be shared
/// across threads and worker processes without synchronization.
pub trait DataTransform: Debug + Send + Sync {
    /// Stable transform name used in logs and pipeline listings
    fn name(&self) -> &'static str;

    /// Apply the transform, consuming the record
    fn apply(&self, record: Record) -> Result<Record, TransformError>;
}

/// Shared handle to a transform
pub type TransformRef = Arc<dyn DataTransform>;

/// Apply transforms in order, stopping at the first failure
pub fn apply_chain(chain: &[TransformRef], mut record: Record) -> Result<Record, TransformError> {
    debug!(len = chain.len(), "apply_chain: called");
    for transform in chain {
        record = transform.apply(record)?;
    }
    Ok(record)
}

/// Borrow an array field or report why it is unusable
pub(crate) fn array_field<'a>(
    record: &'a Record,
    field: &str,
    transform: &'static str,
) -> Result<&'a Array, TransformError> {
    match record.get(field) {
        Some(Value::Array(a)) => Ok(a),
        Some(other) => Err(TransformError::TypeMismatch {
            transform,
            field: field.to_string(),
            expected: "array",
            actual: other.kind(),
        }),
        None => Err(TransformError::MissingField {
            transform,
            field: field.to_string(),
        }),
    }
}

/// Require that an array's last axis covers `needed` entries
pub(crate) fn ensure_width(
    array: &Array,
    needed: usize,
    field: &str,
    transform: &'static str,
) -> Result<(), TransformError> {
    if array.last_dim() < needed {
        return Err(TransformError::ShapeMismatch {
            transform,
            field: field.to_string(),
            needed,
            actual: array.last_dim(),
        });
    }
    Ok(())
}
