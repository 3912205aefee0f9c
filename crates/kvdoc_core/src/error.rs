//! Error types for kvdoc core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in kvdoc core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ordered store error.
    #[error("storage error: {0}")]
    Storage(#[from] kvdoc_storage::StorageError),

    /// Value or key codec error.
    #[error("codec error: {0}")]
    Codec(#[from] kvdoc_codec::CodecError),

    /// An argument has the wrong shape for the operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// A schema or index with this name is already registered.
    #[error("{what} already exists")]
    AlreadyExists {
        /// The duplicate item.
        what: String,
    },

    /// A lookup referenced something outside the registered catalog.
    #[error("range error: {message}")]
    Range {
        /// What could not be resolved.
        message: String,
    },

    /// A value had an unsupported type.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A unique index already holds the tuple for another entity.
    #[error("unique index {index} already holds this value for {existing}")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// Id of the entity that owns the tuple.
        existing: String,
    },
}

impl CoreError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Create a range error.
    pub fn range(message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }
}
