//! Entity codec trait for typed collections.

use kvdoc_codec::Value;

use crate::error::CoreResult;

/// Trait for types that can be stored as entities of one collection.
///
/// Implementors must provide:
/// - `CNAME`: the collection the type belongs to
/// - `encode()`: converts to a document object
/// - `decode()`: reads a stored document back
///
/// The primary-key field is managed by the database. `encode` may leave
/// it out for new entities and `decode` may ignore it.
///
/// # Example
///
/// ```rust
/// use kvdoc_core::{CoreError, CoreResult, EntityCodec, Value};
///
/// struct Book {
///     title: String,
///     pages: f64,
/// }
///
/// impl EntityCodec for Book {
///     const CNAME: &'static str = "Book";
///
///     fn encode(&self) -> CoreResult<Value> {
///         Ok(Value::object([
///             ("title", Value::from(self.title.as_str())),
///             ("pages", Value::from(self.pages)),
///         ]))
///     }
///
///     fn decode(value: &Value) -> CoreResult<Self> {
///         let title = value
///             .get("title")
///             .and_then(Value::as_text)
///             .ok_or_else(|| CoreError::type_mismatch("title must be a string"))?;
///         let pages = value.get("pages").and_then(Value::as_number).unwrap_or(0.0);
///         Ok(Book { title: title.to_string(), pages })
///     }
/// }
/// ```
pub trait EntityCodec: Sized {
    /// Collection name of this type.
    const CNAME: &'static str;

    /// Encodes the entity as a document object.
    fn encode(&self) -> CoreResult<Value>;

    /// Decodes an entity from a stored document.
    fn decode(value: &Value) -> CoreResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        text: String,
    }

    impl EntityCodec for Note {
        const CNAME: &'static str = "Note";

        fn encode(&self) -> CoreResult<Value> {
            Ok(Value::object([("text", self.text.as_str())]))
        }

        fn decode(value: &Value) -> CoreResult<Self> {
            let text = value
                .get("text")
                .and_then(Value::as_text)
                .ok_or_else(|| CoreError::type_mismatch("text"))?;
            Ok(Self { text: text.to_string() })
        }
    }

    #[test]
    fn codec_roundtrip() {
        let note = Note { text: "hello".into() };
        let decoded = Note::decode(&note.encode().unwrap()).unwrap();
        assert_eq!(decoded, note);
    }

    #[test]
    fn decode_rejects_bad_shape() {
        assert!(Note::decode(&Value::from(1)).is_err());
    }
}
