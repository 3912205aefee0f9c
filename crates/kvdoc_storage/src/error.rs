//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The start bound of a range sorts after its end bound.
    #[error("cursor out of bounds")]
    CursorOutOfBounds,

    /// A range bound was empty or otherwise unusable.
    #[error("invalid boundary key: {message}")]
    InvalidBoundaryKey {
        /// Why the bound was rejected.
        message: String,
    },

    /// A key could not be stored.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },

    /// An atomic commit carried more mutations than the store accepts.
    #[error("too many mutations in one commit: {count} (max {max})")]
    TooManyMutations {
        /// Number of mutations submitted.
        count: usize,
        /// Maximum accepted by the store.
        max: usize,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Create an invalid boundary key error.
    pub fn invalid_boundary(message: impl Into<String>) -> Self {
        Self::InvalidBoundaryKey {
            message: message.into(),
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` for the range-scan boundary conditions that a scanner
    /// may treat as the end of its range.
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::CursorOutOfBounds | Self::InvalidBoundaryKey { .. })
    }

    /// Returns `true` only for [`StorageError::InvalidBoundaryKey`].
    #[must_use]
    pub fn is_invalid_boundary(&self) -> bool {
        matches!(self, Self::InvalidBoundaryKey { .. })
    }
}
