//! # kvdoc Core
//!
//! Document store for kvdoc.
//!
//! This crate layers documents over an ordered key-value store and provides:
//! - A collection registry with object and table indexes
//! - Index maintenance on `put`, `patch` and `delete`
//! - Pattern queries with strict (AND) and fuzzy (scored) matching
//! - An operator library for predicate patterns ([`ops`])
//! - Projection of results through selectors
//! - Lazy TTL expiry through a metadata envelope
//! - Change subscriptions and typed collections
//!
//! ## Example
//!
//! ```rust
//! use kvdoc_core::{ops, Database, FindOptions, IndexSpec, Pattern, PutOptions, Value};
//!
//! let db = Database::open_in_memory();
//! db.create_index(IndexSpec::object("Book", ["title", "author"])).unwrap();
//! db.put(
//!     Value::object([("title", "Reinventing Organizations"), ("author", "Laloux")]),
//!     PutOptions::new().cname("Book"),
//! )
//! .unwrap();
//!
//! let hits = db
//!     .find_all(
//!         Pattern::new().field("author", ops::echoes("Lalox")),
//!         FindOptions::new().cname("Book"),
//!     )
//!     .unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod collection;
mod config;
mod database;
mod entity;
mod error;
mod index;
mod matcher;
mod metadata;
pub mod ops;
mod pattern;
mod query;
mod selector;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, SubscriptionFilter};
pub use collection::{Collection, EntityCodec};
pub use config::{Config, DEFAULT_MAX_TRANSACTION_SIZE};
pub use database::{Database, DeleteOptions, Entry, PatchOptions, PutOptions, Target};
pub use entity::{cname_of, is_id, EntityId};
pub use error::{CoreError, CoreResult};
pub use index::{
    object_tuples, table_tuple, IndexDefinition, IndexSpec, IndexType, Registration, Registry,
    Schema, OBJECT_INDEX_PREFIX, TABLE_INDEX_PREFIX,
};
pub use matcher::{match_keys, match_value, KeyMatch};
pub use metadata::{now_ms, Expires, Metadata};
pub use pattern::{FieldKey, Outcome, Pattern, PatternNode, Predicate, Slot, Tuple};
pub use query::{Cursor, FindOptions, Hit, Query, ValueMatch};
pub use selector::{select, SelectContext, SelectNode, Selector, Transform};

pub use kvdoc_codec::{Object, RegexLiteral, Value};
pub use kvdoc_storage::{KeyPart, MemoryStore, OrderedStore};
