//! Key-tuple construction.

use kvdoc_storage::{Key, KeyPart};

use crate::error::{CodecError, CodecResult};
use crate::tagged::{tag_scalar, untag};
use crate::value::Value;

/// Converts a scalar into a key part.
///
/// Dates, regular expressions, symbols and big integers keep their native
/// or tagged form, so they stay comparable inside the keyspace.
///
/// # Errors
///
/// Returns [`CodecError::TypeMismatch`] for null, undefined, arrays and objects.
pub fn key_part(value: &Value) -> CodecResult<KeyPart> {
    match value {
        Value::Bool(b) => Ok(KeyPart::Bool(*b)),
        Value::Number(n) => Ok(KeyPart::Number(*n)),
        Value::Text(s) => Ok(KeyPart::Text(s.clone())),
        Value::BigInt(n) => Ok(KeyPart::BigInt(n.clone())),
        Value::Bytes(b) => Ok(KeyPart::Bytes(b.clone())),
        Value::Date(_) | Value::RegExp(_) | Value::Symbol(_) => tag_scalar(value)
            .map(KeyPart::Text)
            .ok_or_else(|| CodecError::type_mismatch(value.type_name(), "in key")),
        Value::Undefined | Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(CodecError::type_mismatch(value.type_name(), "in key"))
        }
    }
}

/// Like [`key_part`], but null and undefined become the empty-blob sentinel.
///
/// Used for index tuples, where an absent field is still a position.
///
/// # Errors
///
/// Returns [`CodecError::TypeMismatch`] for arrays and objects.
pub fn index_part(value: &Value) -> CodecResult<KeyPart> {
    match value {
        Value::Undefined | Value::Null => Ok(KeyPart::empty()),
        other => key_part(other),
    }
}

/// Builds a key from a value: scalars become one-part keys and arrays
/// expand element-wise.
///
/// # Errors
///
/// Returns [`CodecError::TypeMismatch`] for unsupported slots or an empty array.
pub fn to_key(value: &Value) -> CodecResult<Key> {
    match value {
        Value::Array(items) if items.is_empty() => {
            Err(CodecError::type_mismatch("empty array", "as key"))
        }
        Value::Array(items) => items.iter().map(key_part).collect(),
        scalar => Ok(vec![key_part(scalar)?]),
    }
}

/// Reads a key part back as a value, reversing tags.
#[must_use]
pub fn from_key_part(part: &KeyPart) -> Value {
    match part {
        KeyPart::Bytes(b) => Value::Bytes(b.clone()),
        KeyPart::Text(s) => untag(s).unwrap_or_else(|| Value::Text(s.clone())),
        KeyPart::Number(n) => Value::Number(*n),
        KeyPart::BigInt(n) => Value::BigInt(n.clone()),
        KeyPart::Bool(b) => Value::Bool(*b),
    }
}

/// Reads a whole key back: one-part keys become a scalar, longer keys an array.
#[must_use]
pub fn from_key(key: &[KeyPart]) -> Value {
    match key {
        [single] => from_key_part(single),
        parts => Value::Array(parts.iter().map(from_key_part).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RegexLiteral;
    use num_bigint::BigInt;

    #[test]
    fn scalars_wrap_as_single_part() {
        assert_eq!(to_key(&Value::from("a")).unwrap(), vec![KeyPart::from("a")]);
        assert_eq!(to_key(&Value::from(1)).unwrap(), vec![KeyPart::Number(1.0)]);
    }

    #[test]
    fn arrays_expand() {
        let key = to_key(&Value::Array(vec![
            Value::from("users"),
            Value::Date(5),
            Value::BigInt(BigInt::from(7)),
        ]))
        .unwrap();
        assert_eq!(
            key,
            vec![
                KeyPart::from("users"),
                KeyPart::from("@Date(5)"),
                KeyPart::BigInt(BigInt::from(7)),
            ]
        );
    }

    #[test]
    fn null_key_parts_are_rejected() {
        for value in [Value::Null, Value::Undefined] {
            assert!(matches!(to_key(&value), Err(CodecError::TypeMismatch { .. })));
            let nested = Value::Array(vec![Value::from("users"), value.clone()]);
            assert!(matches!(to_key(&nested), Err(CodecError::TypeMismatch { .. })));
            assert_eq!(index_part(&value).unwrap(), KeyPart::empty());
        }
    }

    #[test]
    fn unsupported_slots_are_rejected() {
        assert!(matches!(to_key(&Value::Null), Err(CodecError::TypeMismatch { .. })));
        assert!(to_key(&Value::Array(vec![])).is_err());
        assert!(to_key(&Value::Array(vec![Value::Array(vec![])])).is_err());
        assert!(key_part(&Value::object([("a", 1)])).is_err());
    }

    #[test]
    fn index_parts_encode_absence() {
        assert_eq!(index_part(&Value::Null).unwrap(), KeyPart::empty());
        assert_eq!(index_part(&Value::Undefined).unwrap(), KeyPart::empty());
    }

    #[test]
    fn key_parts_read_back() {
        let re = RegexLiteral::new("x+", "i").unwrap();
        let part = key_part(&Value::RegExp(re.clone())).unwrap();
        assert_eq!(from_key_part(&part), Value::RegExp(re));
        assert_eq!(from_key(&[KeyPart::from("a")]), Value::from("a"));
        assert_eq!(
            from_key(&[KeyPart::from("a"), KeyPart::Bool(true)]),
            Value::Array(vec![Value::from("a"), Value::Bool(true)])
        );
    }
}
