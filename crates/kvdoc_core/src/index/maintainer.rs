//! Index-entry maintenance.
//!
//! An index entry is the key `[prefix, ...tuple, id]` with a sentinel
//! payload; only its existence matters. Entries are written and removed
//! through atomic commits of at most `batch_size` mutations. Separate
//! batches are not atomic with each other.

use std::collections::BTreeSet;

use kvdoc_codec::{Encode, Value};
use kvdoc_storage::{AtomicOperation, Key, KeyPart, KeyRange, OrderedStore};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::index::definition::{IndexDefinition, IndexType};
use crate::index::extract::{entity_node, object_tuples, table_tuple};

/// Writes and removes index entries for one store.
pub(crate) struct IndexMaintainer<'a> {
    store: &'a dyn OrderedStore,
    batch_size: usize,
}

impl<'a> IndexMaintainer<'a> {
    /// Batches are capped by both `max_transaction_size` and the store limit.
    pub(crate) fn new(store: &'a dyn OrderedStore, max_transaction_size: usize) -> Self {
        Self {
            store,
            batch_size: max_transaction_size.min(store.max_mutations()).max(1),
        }
    }

    /// Entry keys that `index` derives for the entity `value` stored as `id`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a leaf cannot be placed in a key.
    pub(crate) fn entry_keys(
        index: &IndexDefinition,
        value: &Value,
        id: &str,
        primary_key: &str,
    ) -> CoreResult<BTreeSet<Key>> {
        let node = entity_node(value, primary_key);
        let tuples = match index.index_type {
            IndexType::Object => object_tuples(&node, &index.keys),
            IndexType::Table => vec![table_tuple(&node, &index.keys)],
        };
        tuples
            .iter()
            .map(|tuple| -> CoreResult<Key> {
                let mut key = Vec::with_capacity(tuple.len() + 2);
                key.push(KeyPart::from(index.index_type.prefix()));
                for slot in tuple {
                    key.push(slot.index_part()?);
                }
                key.push(KeyPart::from(id));
                Ok(key)
            })
            .collect()
    }

    /// Fails if another entity already owns one of `keys` in a unique index.
    pub(crate) fn check_unique(&self, index: &IndexDefinition, keys: &BTreeSet<Key>, id: &str) -> CoreResult<()> {
        for key in keys {
            let tuple = &key[..key.len() - 1];
            for entry in self.store.list(&KeyRange::prefix(tuple), None) {
                let entry = entry?;
                if entry.key.len() != key.len() {
                    continue;
                }
                if let Some(existing) = entry.key.last().and_then(KeyPart::as_text) {
                    if existing != id {
                        return Err(CoreError::UniqueViolation {
                            index: index.name.clone(),
                            existing: existing.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes `keys` with the sentinel payload.
    pub(crate) fn add<'k>(&self, keys: impl IntoIterator<Item = &'k Key>) -> CoreResult<usize> {
        let sentinel = Value::from(0).encode()?;
        self.apply(keys, |op, key| {
            op.set(key.clone(), sentinel.clone());
        })
    }

    /// Removes `keys`.
    pub(crate) fn remove<'k>(&self, keys: impl IntoIterator<Item = &'k Key>) -> CoreResult<usize> {
        self.apply(keys, |op, key| {
            op.delete(key.clone());
        })
    }

    fn apply<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k Key>,
        mut push: impl FnMut(&mut AtomicOperation<'a>, &Key),
    ) -> CoreResult<usize> {
        let keys: Vec<&Key> = keys.into_iter().collect();
        for batch in keys.chunks(self.batch_size) {
            let mut op = AtomicOperation::new(self.store);
            for key in batch {
                push(&mut op, key);
            }
            op.commit()?;
            debug!(entries = batch.len(), "index batch committed");
        }
        Ok(keys.len())
    }
}
