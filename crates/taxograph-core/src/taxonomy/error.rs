//! Validation errors for taxonomy rows.

use thiserror::Error;

use super::Level;

/// A row that cannot be restructured.
///
/// `row` is the zero-based position of the row in the pulled batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },

    #[error("Row {row}: {level} label is empty")]
    EmptyLabel { row: usize, level: Level },

    #[error("Batch rejected, {} invalid row(s): {}", .0.len(), join_errors(.0))]
    Rejected(Vec<ValidationError>),
}

impl ValidationError {
    /// Row-level errors contained in this error.
    pub fn row_errors(&self) -> &[ValidationError] {
        match self {
            ValidationError::Rejected(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
