//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use kvdoc_codec::{Object, Value};
use kvdoc_core::EntityId;
use kvdoc_storage::{BigInt, KeyPart};
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating collection names.
pub fn cname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for generating entity ids of `cname`.
pub fn entity_id_strategy(cname: &'static str) -> impl Strategy<Value = EntityId> {
    any::<[u8; 16]>().prop_map(move |bytes| EntityId::from_parts(Some(cname), Uuid::from_bytes(bytes)))
}

/// Strategy for plain text that never looks like a tagged string.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ]{0,16}").expect("Invalid regex")
}

/// Strategy for generating key parts of every kind.
pub fn key_part_strategy() -> impl Strategy<Value = KeyPart> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..8).prop_map(KeyPart::Bytes),
        text_strategy().prop_map(KeyPart::Text),
        any::<f64>().prop_map(KeyPart::Number),
        any::<i64>().prop_map(|n| KeyPart::BigInt(BigInt::from(n))),
        any::<bool>().prop_map(KeyPart::Bool),
    ]
}

/// Strategy for generating scalar values, extended types included.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(Value::Undefined),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        text_strategy().prop_map(Value::Text),
        any::<i64>().prop_map(|n| Value::BigInt(BigInt::from(n) * 1_000_000_007_i64)),
        (-10_000_000_000_000_i64..10_000_000_000_000).prop_map(Value::Date),
        "[a-z]{1,8}".prop_map(Value::Symbol),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating nested values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Object>())),
        ]
    })
}

/// Strategy for small book-like documents over a fixed field set, so
/// generated documents share index entries.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    (
        prop::sample::select(vec!["T1", "T2", "T3"]),
        prop::sample::select(vec!["Laloux", "Jones"]),
        prop::option::of(1990_i32..1995),
    )
        .prop_map(|(title, author, year)| {
            let mut object = Object::new().with("title", title).with("author", author);
            if let Some(year) = year {
                object.insert("year", year);
            }
            Value::Object(object)
        })
}

/// Fields of [`document_strategy`] documents.
pub const DOCUMENT_FIELDS: [&str; 3] = ["title", "author", "year"];

/// Strategy for a non-empty subset of [`DOCUMENT_FIELDS`], in field order.
pub fn document_keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(DOCUMENT_FIELDS.to_vec(), 1..=DOCUMENT_FIELDS.len())
        .prop_map(|keys| keys.into_iter().map(str::to_string).collect())
}

/// An operation applied to one of a few entity slots.
#[derive(Debug, Clone)]
pub enum DocOperation {
    /// Put a full document
    Put {
        /// Entity slot
        slot: usize,
        /// Document
        doc: Value,
    },
    /// Put a full document, maintaining only these object-index keys
    PutKeyed {
        /// Entity slot
        slot: usize,
        /// Document
        doc: Value,
        /// Indexed fields
        keys: Vec<String>,
    },
    /// Put a full document, maintaining table indexes only
    PutTableOnly {
        /// Entity slot
        slot: usize,
        /// Document
        doc: Value,
    },
    /// Merge fields into the entity
    Patch {
        /// Entity slot
        slot: usize,
        /// Fields to merge
        doc: Value,
    },
    /// Delete the entity
    Delete {
        /// Entity slot
        slot: usize,
    },
}

/// Strategy for generating document operations over `slots` entities.
pub fn doc_operation_strategy(slots: usize) -> impl Strategy<Value = DocOperation> {
    let slot = 0..slots.max(1);
    prop_oneof![
        3 => (slot.clone(), document_strategy()).prop_map(|(slot, doc)| DocOperation::Put { slot, doc }),
        1 => (slot.clone(), document_strategy(), document_keys_strategy())
            .prop_map(|(slot, doc, keys)| DocOperation::PutKeyed { slot, doc, keys }),
        1 => (slot.clone(), document_strategy()).prop_map(|(slot, doc)| DocOperation::PutTableOnly { slot, doc }),
        2 => (slot.clone(), document_strategy()).prop_map(|(slot, doc)| DocOperation::Patch { slot, doc }),
        1 => slot.prop_map(|slot| DocOperation::Delete { slot }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    slots: usize,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DocOperation>> {
    prop::collection::vec(doc_operation_strategy(slots), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvdoc_codec::{Decode, Encode};
    use kvdoc_core::{cname_of, is_id};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn entity_ids_carry_their_collection(id in entity_id_strategy("Book")) {
            let text = id.to_string();
            prop_assert!(is_id(&text));
            let cname = cname_of(&text);
            prop_assert_eq!(cname.as_deref(), Some("Book"));
        }

        #[test]
        fn nested_values_survive_the_codec(value in value_strategy()) {
            let bytes = value.encode().unwrap();
            prop_assert_eq!(Value::decode(&bytes).unwrap(), value);
        }

        #[test]
        fn key_parts_have_a_total_order(a in key_part_strategy(), b in key_part_strategy()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn cnames_are_identifiers(name in cname_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains('@'));
        }

        #[test]
        fn document_keys_are_known_fields(keys in document_keys_strategy()) {
            prop_assert!(!keys.is_empty());
            prop_assert!(keys.iter().all(|key| DOCUMENT_FIELDS.contains(&key.as_str())));
        }

        #[test]
        fn documents_are_objects(doc in document_strategy()) {
            let object = doc.as_object().unwrap();
            prop_assert!(object.get("title").is_some());
            prop_assert!(object.get("author").is_some());
        }
    }
}
