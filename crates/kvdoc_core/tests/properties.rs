//! Property tests: index entries always mirror the stored entities.

use std::collections::HashMap;
use std::sync::Arc;

use kvdoc_core::{
    Database, DeleteOptions, EntityId, FindOptions, IndexSpec, IndexType, KeyPart, MemoryStore,
    Object, PatchOptions, Pattern, PutOptions, Query, Value, OBJECT_INDEX_PREFIX,
};
use kvdoc_testkit::{
    document_strategy, operation_sequence_strategy, DocOperation, PropTestConfig, DOCUMENT_FIELDS,
};
use proptest::prelude::*;

const SLOTS: usize = 3;

fn open() -> (Arc<MemoryStore>, Database) {
    let store = Arc::new(MemoryStore::new());
    let db = Database::open(store.clone());
    db.create_index(IndexSpec::object("Book", DOCUMENT_FIELDS)).unwrap();
    (store, db)
}

fn with_id(doc: &Value, id: &str) -> Value {
    let mut object = doc.as_object().cloned().unwrap_or_default();
    object.insert("#", id);
    Value::Object(object)
}

/// A live entity of the model and the fields its last write indexed.
struct Modeled {
    fields: Object,
    indexed: Vec<String>,
}

impl Modeled {
    fn put(doc: &Value, id: &str, indexed: Vec<String>) -> Self {
        let mut fields = doc.as_object().cloned().unwrap_or_default();
        fields.insert("#", id);
        Self { fields, indexed }
    }

    fn entries(&self) -> usize {
        self.fields.keys().filter(|key| self.indexes(key)).count()
    }

    fn indexes(&self, field: &str) -> bool {
        self.indexed.iter().any(|key| key == field)
    }
}

fn all_fields() -> Vec<String> {
    DOCUMENT_FIELDS.iter().map(|field| field.to_string()).collect()
}

fn index_entry_count(store: &MemoryStore) -> usize {
    store
        .keys()
        .iter()
        .filter(|key| key.first().and_then(KeyPart::as_text) == Some(OBJECT_INDEX_PREFIX))
        .count()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn index_entries_track_entities(ops in operation_sequence_strategy(SLOTS, 1, 24)) {
        let (store, db) = open();
        let ids: Vec<String> = (0..SLOTS).map(|_| EntityId::new(Some("Book")).to_string()).collect();
        let mut model: HashMap<usize, Modeled> = HashMap::new();

        for op in &ops {
            match op {
                DocOperation::Put { slot, doc } => {
                    db.put(with_id(doc, &ids[*slot]), PutOptions::new()).unwrap();
                    model.insert(*slot, Modeled::put(doc, &ids[*slot], all_fields()));
                }
                DocOperation::PutKeyed { slot, doc, keys } => {
                    db.put(with_id(doc, &ids[*slot]), PutOptions::new().index_keys(keys.clone()))
                        .unwrap();
                    model.insert(*slot, Modeled::put(doc, &ids[*slot], keys.clone()));
                }
                DocOperation::PutTableOnly { slot, doc } => {
                    db.put(with_id(doc, &ids[*slot]), PutOptions::new().index_type(IndexType::Table))
                        .unwrap();
                    model.insert(*slot, Modeled::put(doc, &ids[*slot], Vec::new()));
                }
                DocOperation::Patch { slot, doc } => {
                    db.patch(with_id(doc, &ids[*slot]), PatchOptions::new()).unwrap();
                    let update = with_id(doc, &ids[*slot]);
                    let entry = model.entry(*slot).or_insert_with(|| Modeled {
                        fields: Object::new(),
                        indexed: Vec::new(),
                    });
                    if let Some(update) = update.as_object() {
                        entry.fields.assign(update);
                    }
                    entry.indexed = all_fields();
                }
                DocOperation::Delete { slot } => {
                    db.delete(ids[*slot].as_str(), DeleteOptions::new()).unwrap();
                    model.remove(slot);
                }
            }
        }

        // One entry per indexed field of every live entity.
        let expected: usize = model.values().map(Modeled::entries).sum();
        prop_assert_eq!(index_entry_count(&store), expected);

        for (slot, modeled) in &model {
            let id = Value::from(ids[*slot].as_str());
            let entry = db.get(&id).unwrap().unwrap();
            for (name, value) in modeled.fields.iter() {
                prop_assert_eq!(entry.value.get(name), Some(value));
            }
            let title = modeled.fields.get("title").cloned().unwrap_or(Value::Null);
            let hits = db
                .find_all(Pattern::new().field("title", title), FindOptions::new().cname("Book"))
                .unwrap();
            prop_assert_eq!(hits.iter().any(|hit| hit.key == id), modeled.indexes("title"));
        }
        prop_assert_eq!(
            db.find_all(Query::All, FindOptions::new().cname("Book")).unwrap().len(),
            model.len()
        );
    }

    #[test]
    fn put_is_idempotent(doc in document_strategy()) {
        let (store, db) = open();
        let id = db.put(doc.clone(), PutOptions::new().cname("Book")).unwrap();
        let keys = store.keys();

        db.put(with_id(&doc, &id), PutOptions::new().cname("Book")).unwrap();
        prop_assert_eq!(store.keys(), keys);
    }
}
