//! Typed collection API.
//!
//! Provides `Collection<T>` for type-safe entity storage. Types map to
//! and from document values through the `EntityCodec` trait, keyed by
//! their collection name.

mod codec;
mod typed;

pub use codec::EntityCodec;
pub use typed::Collection;
