//! Secondary indexes.
//!
//! Indexes are derived records that live next to the primary records in
//! the ordered store. They are:
//! - Declared per collection through the registry
//! - Computed by the key extractor from an entity's current value
//! - Maintained on `put`, `patch` and `delete` in bounded batches
//!
//! # Index Types
//!
//! - [`IndexType::Object`]: one entry per leaf path, any field subset can be probed
//! - [`IndexType::Table`]: one composite entry per declared key list

mod definition;
pub(crate) mod extract;
pub(crate) mod maintainer;
mod registry;

pub use definition::{
    IndexDefinition, IndexSpec, IndexType, Schema, OBJECT_INDEX_PREFIX, TABLE_INDEX_PREFIX,
};
pub use extract::{object_tuples, table_tuple};
pub use registry::{Registration, Registry};
