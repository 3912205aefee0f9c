//! In-memory ordered store.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter;

use parking_lot::RwLock;

use crate::backend::{
    KvEntry, ListIter, Mutation, OrderedStore, Versionstamp, DEFAULT_MAX_MUTATIONS,
};
use crate::error::{StorageError, StorageResult};
use crate::key::{cmp_key_to_bound, BoundPart, Key, KeyPart, KeyRange};

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<Key, (Vec<u8>, Versionstamp)>,
    version: Versionstamp,
}

impl Inner {
    fn next_version(&mut self) -> Versionstamp {
        self.version += 1;
        self.version
    }
}

/// An in-memory ordered store.
///
/// This store keeps every record in a `BTreeMap` and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// Scans take a snapshot of the matching records, so writes issued while
/// iterating do not disturb the iterator.
///
/// # Example
///
/// ```rust
/// use kvdoc_storage::{KeyPart, KeyRange, MemoryStore, OrderedStore};
///
/// let store = MemoryStore::new();
/// store.set(&[KeyPart::from("a"), KeyPart::from(1)], b"x".to_vec()).unwrap();
/// let found: Vec<_> = store
///     .list(&KeyRange::prefix(&[KeyPart::from("a")]), None)
///     .collect();
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    max_mutations: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_mutations: DEFAULT_MAX_MUTATIONS,
        }
    }
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects commits larger than `max_mutations`.
    #[must_use]
    pub fn with_max_mutations(max_mutations: usize) -> Self {
        Self {
            max_mutations,
            ..Self::default()
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Returns every key in order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.inner.read().records.keys().cloned().collect()
    }

    fn validate(range: &KeyRange) -> StorageResult<()> {
        if range.start.is_empty() {
            return Err(StorageError::invalid_boundary("empty start key"));
        }
        if range.end.is_empty() {
            return Err(StorageError::invalid_boundary("empty end key"));
        }
        if compare_bounds(&range.start, &range.end) == Ordering::Greater {
            return Err(StorageError::CursorOutOfBounds);
        }
        Ok(())
    }
}

fn compare_bounds(a: &[BoundPart], b: &[BoundPart]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[KeyPart]) -> StorageResult<Option<KvEntry>> {
        let inner = self.inner.read();
        Ok(inner.records.get(key).map(|(value, versionstamp)| KvEntry {
            key: key.to_vec(),
            value: value.clone(),
            versionstamp: *versionstamp,
        }))
    }

    fn set(&self, key: &[KeyPart], value: Vec<u8>) -> StorageResult<Versionstamp> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        let mut inner = self.inner.write();
        let version = inner.next_version();
        inner.records.insert(key.to_vec(), (value, version));
        Ok(version)
    }

    fn delete(&self, key: &[KeyPart]) -> StorageResult<()> {
        self.inner.write().records.remove(key);
        Ok(())
    }

    fn list(&self, range: &KeyRange, limit: Option<usize>) -> ListIter<'_> {
        if let Err(err) = Self::validate(range) {
            return Box::new(iter::once(Err(err)));
        }

        let inner = self.inner.read();
        // Every key inside the range is >= [first start part].
        let scan: Box<dyn Iterator<Item = (&Key, &(Vec<u8>, Versionstamp))>> =
            match range.start.first() {
                Some(BoundPart::Part(first)) => Box::new(inner.records.range(vec![first.clone()]..)),
                _ => Box::new(inner.records.iter()),
            };

        let snapshot: Vec<StorageResult<KvEntry>> = scan
            .skip_while(|(key, _)| cmp_key_to_bound(key, &range.start) == Ordering::Less)
            .take_while(|(key, _)| cmp_key_to_bound(key, &range.end) == Ordering::Less)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, (value, versionstamp))| {
                Ok(KvEntry {
                    key: key.clone(),
                    value: value.clone(),
                    versionstamp: *versionstamp,
                })
            })
            .collect();

        tracing::trace!(count = snapshot.len(), "memory store scan");
        Box::new(snapshot.into_iter())
    }

    fn commit(&self, mutations: Vec<Mutation>) -> StorageResult<Versionstamp> {
        if mutations.len() > self.max_mutations {
            return Err(StorageError::TooManyMutations {
                count: mutations.len(),
                max: self.max_mutations,
            });
        }
        if mutations
            .iter()
            .any(|m| matches!(m, Mutation::Set { key, .. } if key.is_empty()))
        {
            return Err(StorageError::invalid_key("empty key"));
        }

        let mut inner = self.inner.write();
        let version = inner.next_version();
        for mutation in mutations {
            match mutation {
                Mutation::Set { key, value } => {
                    inner.records.insert(key, (value, version));
                }
                Mutation::Delete { key } => {
                    inner.records.remove(&key);
                }
            }
        }
        Ok(version)
    }

    fn max_mutations(&self) -> usize {
        self.max_mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AtomicOperation;
    use crate::key::KeyKind;

    fn k(parts: &[&str]) -> Key {
        parts.iter().map(|p| KeyPart::from(*p)).collect()
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn memory_set_get_delete() {
        let store = MemoryStore::new();
        let v1 = store.set(&k(&["a"]), b"one".to_vec()).unwrap();
        let v2 = store.set(&k(&["a"]), b"two".to_vec()).unwrap();
        assert!(v2 > v1);

        let entry = store.get(&k(&["a"])).unwrap().unwrap();
        assert_eq!(entry.value, b"two");
        assert_eq!(entry.versionstamp, v2);

        store.delete(&k(&["a"])).unwrap();
        assert!(store.get(&k(&["a"])).unwrap().is_none());
        // deleting twice is fine
        store.delete(&k(&["a"])).unwrap();
    }

    #[test]
    fn memory_rejects_empty_key() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set(&[], vec![]),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn memory_list_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for n in [3, 1, 2, 5, 4] {
            store
                .set(&[KeyPart::from("n"), KeyPart::from(n)], vec![])
                .unwrap();
        }
        store.set(&k(&["m", "x"]), vec![]).unwrap();
        store.set(&k(&["o", "x"]), vec![]).unwrap();

        let range = KeyRange::new(
            vec![BoundPart::Part(KeyPart::from("n")), BoundPart::Part(KeyPart::from(2))],
            vec![BoundPart::Part(KeyPart::from("n")), BoundPart::Part(KeyPart::from(5))],
        );
        let found: Vec<Key> = store.list(&range, None).map(|e| e.unwrap().key).collect();
        assert_eq!(
            found,
            vec![
                vec![KeyPart::from("n"), KeyPart::from(2)],
                vec![KeyPart::from("n"), KeyPart::from(3)],
                vec![KeyPart::from("n"), KeyPart::from(4)],
            ]
        );

        let limited = store.list(&KeyRange::prefix(&k(&["n"])), Some(2)).count();
        assert_eq!(limited, 2);
    }

    #[test]
    fn memory_list_with_sentinels() {
        let store = MemoryStore::new();
        store.set(&[KeyPart::from("p"), KeyPart::from("a")], vec![]).unwrap();
        store.set(&[KeyPart::from("p"), KeyPart::from(1)], vec![]).unwrap();
        store.set(&[KeyPart::from("p"), KeyPart::Bool(true)], vec![]).unwrap();

        let range = KeyRange::new(
            vec![BoundPart::Part(KeyPart::from("p")), BoundPart::Min(KeyKind::Number)],
            vec![BoundPart::Part(KeyPart::from("p")), BoundPart::Max(KeyKind::Number)],
        );
        let found: Vec<Key> = store.list(&range, None).map(|e| e.unwrap().key).collect();
        assert_eq!(found, vec![vec![KeyPart::from("p"), KeyPart::from(1)]]);

        assert_eq!(store.list(&KeyRange::all(), None).count(), 3);
    }

    #[test]
    fn memory_list_boundary_errors() {
        let store = MemoryStore::new();
        let empty = KeyRange::new(vec![], vec![BoundPart::max_any()]);
        let err = store.list(&empty, None).next().unwrap().unwrap_err();
        assert!(err.is_invalid_boundary());

        let inverted = KeyRange::new(
            vec![BoundPart::Part(KeyPart::from("z"))],
            vec![BoundPart::Part(KeyPart::from("a"))],
        );
        let err = store.list(&inverted, None).next().unwrap().unwrap_err();
        assert_eq!(err, StorageError::CursorOutOfBounds);
    }

    #[test]
    fn memory_atomic_commit() {
        let store = MemoryStore::new();
        store.set(&k(&["gone"]), vec![]).unwrap();

        let mut op = AtomicOperation::new(&store);
        op.set(k(&["a"]), vec![1]).set(k(&["b"]), vec![2]).delete(k(&["gone"]));
        assert_eq!(op.len(), 3);
        op.commit().unwrap();

        assert_eq!(store.keys(), vec![k(&["a"]), k(&["b"])]);
        let a = store.get(&k(&["a"])).unwrap().unwrap();
        let b = store.get(&k(&["b"])).unwrap().unwrap();
        assert_eq!(a.versionstamp, b.versionstamp);
    }

    #[test]
    fn memory_commit_limit() {
        let store = MemoryStore::with_max_mutations(2);
        let mut op = AtomicOperation::new(&store);
        op.set(k(&["a"]), vec![]).set(k(&["b"]), vec![]).set(k(&["c"]), vec![]);
        assert!(matches!(
            op.commit(),
            Err(StorageError::TooManyMutations { count: 3, max: 2 })
        ));
        assert!(store.is_empty());
    }
}
