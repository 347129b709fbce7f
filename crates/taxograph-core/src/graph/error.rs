//! Restructuring engine error types.

use thiserror::Error;

use crate::taxonomy::ValidationError;

/// Errors that can occur while restructuring a batch.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The batch contains rows that cannot become nodes.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Node or edge bookkeeping disagreed with itself. This is a defect.
    #[error("Inconsistent graph: {0}")]
    Inconsistent(String),
}
