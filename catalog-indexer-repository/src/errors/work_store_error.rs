//! Work store error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while reading works from the relational source store.
///
/// Any of these aborts the current message only; the read transaction that
/// produced it has already been rolled back.
#[derive(Debug, Error)]
pub enum WorkStoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Work not found: {0}")]
    WorkNotFound(Uuid),

    /// A row was present but could not be interpreted.
    #[error("Unexpected shape: {0}")]
    UnexpectedShape(String),
}

impl WorkStoreError {
    /// Create an unexpected shape error.
    pub fn unexpected_shape(msg: impl Into<String>) -> Self {
        Self::UnexpectedShape(msg.into())
    }
}
