//! Tagged-string encoding of extended types.
//!
//! The ordered store only understands strings, numbers, big integers,
//! booleans and blobs. Everything else is written as a tagged string and
//! recognised again on the way out:
//!
//! | Value              | Stored as                 |
//! |--------------------|---------------------------|
//! | `Date(ms)`         | `@Date(<ms>)`             |
//! | `RegExp`           | `@RegExp(/<source>/<flags>)` |
//! | `Symbol(name)`     | `@Symbol(<name>)`         |
//! | `BigInt(n)`        | `@BigInt(<digits>)`       |
//! | `Undefined`        | `@undefined`              |
//!
//! Strings that look like a tag but fail to parse are left untouched.

use std::sync::LazyLock;

use num_bigint::BigInt;
use regex::Regex;

use crate::value::{Object, RegexLiteral, Value};

static DATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@Date\((-?\d+)\)$").expect("static regex"));
static REGEXP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@RegExp\((/.*)\)$").expect("static regex"));
static SYMBOL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@Symbol\((.*)\)$").expect("static regex"));
static BIGINT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@BigInt\((-?\d+)\)$").expect("static regex"));

const UNDEFINED_TAG: &str = "@undefined";

/// Returns the tagged form of a single extended scalar, or `None` if the
/// value is stored natively.
#[must_use]
pub fn tag_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Undefined => Some(UNDEFINED_TAG.to_string()),
        Value::Date(ms) => Some(format!("@Date({ms})")),
        Value::RegExp(re) => Some(format!("@RegExp({re})")),
        Value::Symbol(name) => Some(format!("@Symbol({name})")),
        Value::BigInt(n) => Some(format!("@BigInt({n})")),
        _ => None,
    }
}

/// Parses a tagged string back into its value, or `None` if `text` is not
/// a well-formed tag.
#[must_use]
pub fn untag(text: &str) -> Option<Value> {
    if !text.starts_with('@') {
        return None;
    }
    if text == UNDEFINED_TAG {
        return Some(Value::Undefined);
    }
    if let Some(caps) = DATE_TAG.captures(text) {
        return caps[1].parse::<i64>().ok().map(Value::Date);
    }
    if let Some(caps) = BIGINT_TAG.captures(text) {
        return caps[1].parse::<BigInt>().ok().map(Value::BigInt);
    }
    if let Some(caps) = REGEXP_TAG.captures(text) {
        return RegexLiteral::parse_literal(&caps[1]).map(Value::RegExp);
    }
    if let Some(caps) = SYMBOL_TAG.captures(text) {
        return Some(Value::Symbol(caps[1].to_string()));
    }
    None
}

/// Converts a value into its storable form.
///
/// Arrays and objects are copied recursively (the object class tag is
/// kept); blobs pass through untouched.
#[must_use]
pub fn serialize(value: &Value) -> Value {
    if let Some(tag) = tag_scalar(value) {
        return Value::Text(tag);
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(serialize).collect()),
        Value::Object(object) => Value::Object(map_object(object, serialize)),
        other => other.clone(),
    }
}

/// Reverses [`serialize`].
#[must_use]
pub fn deserialize(value: &Value) -> Value {
    match value {
        Value::Text(text) => untag(text).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(deserialize).collect()),
        Value::Object(object) => Value::Object(map_object(object, deserialize)),
        other => other.clone(),
    }
}

fn map_object(object: &Object, f: fn(&Value) -> Value) -> Object {
    let mut out: Object = object.iter().map(|(k, v)| (k.to_string(), f(v))).collect();
    out.set_class(object.class().map(str::to_string));
    out
}
