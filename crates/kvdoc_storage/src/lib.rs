//! # kvdoc Storage
//!
//! Ordered key-value store interface and reference implementation.
//!
//! This crate is the lowest layer of kvdoc. A store maps typed key
//! tuples to **opaque payloads** and scans them in a single total order,
//! even when tuples mix strings, numbers, big integers, booleans and
//! binary blobs.
//!
//! ## Design Principles
//!
//! - Stores never interpret payloads
//! - Range bounds may use per-kind minimum/maximum sentinels
//! - Atomic commits are bounded by [`OrderedStore::max_mutations`]
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use kvdoc_storage::{KeyPart, MemoryStore, OrderedStore};
//!
//! let store = MemoryStore::new();
//! let key = vec![KeyPart::from("users"), KeyPart::from(1)];
//! store.set(&key, b"alice".to_vec()).unwrap();
//! let entry = store.get(&key).unwrap().unwrap();
//! assert_eq!(entry.value, b"alice");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod key;
mod memory;

pub use backend::{
    AtomicOperation, KvEntry, ListIter, Mutation, OrderedStore, Versionstamp,
    DEFAULT_MAX_MUTATIONS,
};
pub use error::{StorageError, StorageResult};
pub use key::{cmp_key_to_bound, BoundPart, Key, KeyKind, KeyPart, KeyRange};
pub use memory::MemoryStore;
pub use num_bigint::BigInt;
