//! Ordered store trait definition.

use crate::error::{StorageError, StorageResult};
use crate::key::{Key, KeyPart, KeyRange};

/// Monotonic version assigned to every committed write.
pub type Versionstamp = u64;

/// Default cap on mutations per atomic commit.
pub const DEFAULT_MAX_MUTATIONS: usize = 1000;

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct KvEntry {
    /// The record key.
    pub key: Key,
    /// The opaque payload.
    pub value: Vec<u8>,
    /// Version of the write that produced this record.
    pub versionstamp: Versionstamp,
}

/// One write inside an atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Store `value` under `key`.
    Set {
        /// Target key.
        key: Key,
        /// Payload.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Target key.
        key: Key,
    },
}

/// Lazy sequence of scanned records.
pub type ListIter<'a> = Box<dyn Iterator<Item = StorageResult<KvEntry>> + Send + 'a>;

/// An ordered key-value store.
///
/// Stores are **opaque payload stores** over a totally ordered tuple
/// keyspace. They do not interpret values; kvdoc owns the value encoding
/// and the layout of index records.
///
/// # Invariants
///
/// - `list` yields records in ascending key order
/// - `commit` applies all of its mutations or none of them
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryStore`] - In-process reference store
pub trait OrderedStore: Send + Sync {
    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &[KeyPart]) -> StorageResult<Option<KvEntry>>;

    /// Stores `value` under `key` and returns the new version.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the store cannot be written.
    fn set(&self, key: &[KeyPart], value: Vec<u8>) -> StorageResult<Versionstamp>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, key: &[KeyPart]) -> StorageResult<()>;

    /// Scans `range` in ascending order, yielding at most `limit` records.
    ///
    /// Boundary problems surface as items of the iterator:
    /// [`StorageError::InvalidBoundaryKey`] for an empty bound and
    /// [`StorageError::CursorOutOfBounds`] when `start` sorts after `end`.
    fn list(&self, range: &KeyRange, limit: Option<usize>) -> ListIter<'_>;

    /// Applies `mutations` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooManyMutations`] if the batch exceeds
    /// [`OrderedStore::max_mutations`].
    fn commit(&self, mutations: Vec<Mutation>) -> StorageResult<Versionstamp>;

    /// Maximum number of mutations accepted by one commit.
    fn max_mutations(&self) -> usize {
        DEFAULT_MAX_MUTATIONS
    }
}

/// Builder for an atomic commit.
///
/// # Example
///
/// ```rust
/// use kvdoc_storage::{AtomicOperation, KeyPart, MemoryStore, OrderedStore};
///
/// let store = MemoryStore::new();
/// let mut op = AtomicOperation::new(&store);
/// op.set(vec![KeyPart::from("a")], vec![1]);
/// op.set(vec![KeyPart::from("b")], vec![2]);
/// op.commit().unwrap();
/// assert!(store.get(&[KeyPart::from("b")]).unwrap().is_some());
/// ```
pub struct AtomicOperation<'a> {
    store: &'a dyn OrderedStore,
    mutations: Vec<Mutation>,
}

impl<'a> AtomicOperation<'a> {
    /// Starts an empty commit against `store`.
    pub fn new(store: &'a dyn OrderedStore) -> Self {
        Self {
            store,
            mutations: Vec::new(),
        }
    }

    /// Queues a set.
    pub fn set(&mut self, key: Key, value: Vec<u8>) -> &mut Self {
        self.mutations.push(Mutation::Set { key, value });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.mutations.push(Mutation::Delete { key });
        self
    }

    /// Number of queued mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Commits the queued mutations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooManyMutations`] if the store rejects the
    /// batch size, or any error from the store itself.
    pub fn commit(self) -> StorageResult<Versionstamp> {
        let max = self.store.max_mutations();
        if self.mutations.len() > max {
            return Err(StorageError::TooManyMutations {
                count: self.mutations.len(),
                max,
            });
        }
        self.store.commit(self.mutations)
    }
}
