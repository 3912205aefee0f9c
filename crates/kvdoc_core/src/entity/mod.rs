//! Entity identifiers.

mod id;

pub use id::{cname_of, id_range_end, id_range_start, is_id, EntityId};
