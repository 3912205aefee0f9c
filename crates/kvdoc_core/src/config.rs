//! Database configuration.

/// Default cap on operations per index-maintenance commit.
pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 10;

/// Configuration for opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of index writes per atomic commit.
    ///
    /// The effective batch size is also capped by the store's own limit.
    pub max_transaction_size: usize,

    /// Primary-key field used when a collection does not declare its own.
    pub id_property: String,

    /// Field that `put` lifts out of a document into its metadata envelope.
    pub metadata_property: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
            id_property: "#".to_string(),
            metadata_property: "^".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of index writes per commit.
    #[must_use]
    pub fn max_transaction_size(mut self, size: usize) -> Self {
        self.max_transaction_size = size.max(1);
        self
    }

    /// Sets the default primary-key field.
    #[must_use]
    pub fn id_property(mut self, name: impl Into<String>) -> Self {
        self.id_property = name.into();
        self
    }

    /// Sets the metadata field.
    #[must_use]
    pub fn metadata_property(mut self, name: impl Into<String>) -> Self {
        self.metadata_property = name.into();
        self
    }
}
