//! Error types for storage operations.

use crate::id::LocalId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The record does not exist.
    #[error("record {id} not found in {model}")]
    NotFound {
        /// Model searched.
        model: String,
        /// Missing record id.
        id: LocalId,
    },

    /// A unique constraint was violated.
    #[error("unique constraint {constraint} violated on {model}")]
    UniqueViolation {
        /// Model holding the constraint.
        model: String,
        /// Name of the constraint.
        constraint: String,
    },

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(model: impl Into<String>, id: LocalId) -> Self {
        Self::NotFound {
            model: model.into(),
            id,
        }
    }

    /// Returns true if a retry may succeed.
    ///
    /// A unique violation usually means a concurrent writer won; a retry
    /// sees its row and takes the update path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }
}
