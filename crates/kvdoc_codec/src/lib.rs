//! # kvdoc Codec
//!
//! Value model, tagged serialization and key encoding for kvdoc.
//!
//! This crate turns rich document values into the two shapes the ordered
//! store understands:
//! - **Keys**: tuples of typed parts ([`to_key`], [`index_part`])
//! - **Payloads**: CBOR bytes of a tagged, storable value ([`Encode`])
//!
//! ## Tagged Strings
//!
//! Dates, regular expressions, symbols, big integers and `undefined` have
//! no native slot in the store. They are persisted as `@Date(ms)`,
//! `@RegExp(/src/flags)`, `@Symbol(name)`, `@BigInt(digits)` and
//! `@undefined`. This format is stable across versions.
//!
//! ## Usage
//!
//! ```
//! use kvdoc_codec::{Decode, Encode, Value};
//!
//! let value = Value::object([("due", Value::Date(1_700_000_000_000))]);
//! let bytes = value.encode().unwrap();
//! assert_eq!(Value::decode(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod key;
mod tagged;
mod value;

pub use decoder::{from_bytes, Decoder};
pub use encoder::{to_bytes, Encoder};
pub use error::{CodecError, CodecResult};
pub use key::{from_key, from_key_part, index_part, key_part, to_key};
pub use tagged::{deserialize, serialize, tag_scalar, untag};
pub use value::{format_number, Object, RegexLiteral, Value};

/// Trait for types that can be encoded to a stored payload.
pub trait Encode {
    /// Encode this value to payload bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from a stored payload.
pub trait Decode: Sized {
    /// Decode this value from payload bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_bytes(&serialize(self))
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_bytes(bytes).map(|stored| deserialize(&stored))
    }
}
