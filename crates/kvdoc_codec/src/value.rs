//! Dynamic document value type.

use std::fmt;

use num_bigint::BigInt;
use regex::{Regex, RegexBuilder};

use crate::error::{CodecError, CodecResult};

/// A compiled regular expression that remembers its literal form.
///
/// Equality compares `source` and `flags`, never the compiled program.
/// The `i`, `m` and `s` flags change matching; `g`, `u`, `y` and `d` are
/// kept for round-tripping only.
#[derive(Clone)]
pub struct RegexLiteral {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegexLiteral {
    /// Compiles `source` with `flags`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidRegex`] for unknown flags or a pattern
    /// the regex engine rejects.
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> CodecResult<Self> {
        let source = source.into();
        let flags = flags.into();
        let invalid = |message: String| CodecError::InvalidRegex {
            source_text: source.clone(),
            flags: flags.clone(),
            message,
        };
        if let Some(bad) = flags.chars().find(|c| !"dgimsuy".contains(*c)) {
            return Err(invalid(format!("unknown flag '{bad}'")));
        }
        let regex = RegexBuilder::new(&source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            source,
            flags,
            regex,
        })
    }

    /// Parses a `/source/flags` literal.
    ///
    /// Returns `None` if `text` is not shaped like a literal or does not compile.
    #[must_use]
    pub fn parse_literal(text: &str) -> Option<Self> {
        let body = text.strip_prefix('/')?;
        let close = body.rfind('/')?;
        let (source, flags) = (&body[..close], &body[close + 1..]);
        if source.is_empty() {
            return None;
        }
        Self::new(source, flags).ok()
    }

    /// The pattern source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The flags.
    #[must_use]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Returns `true` if the pattern matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Returns the first capture group of the first match, if any.
    #[must_use]
    pub fn first_group<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl fmt::Debug for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegexLiteral({self})")
    }
}

/// An ordered field map with an optional class tag.
///
/// The class tag names the collection a document was read from, so a
/// rehydrated entity knows its type. Field order is preserved but does
/// not take part in equality.
#[derive(Debug, Clone, Default)]
pub struct Object {
    class: Option<String>,
    entries: Vec<(String, Value)>,
}

impl Object {
    /// Creates an empty untagged object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty object tagged with `class`.
    #[must_use]
    pub fn with_class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            entries: Vec::new(),
        }
    }

    /// The class tag.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Replaces the class tag.
    pub fn set_class(&mut self, class: Option<String>) {
        self.class = class;
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a field mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns `true` if the field exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets a field, keeping its position if it already exists.
    /// Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder form of [`Object::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Keeps only the fields for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields in order, values mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every field of `other` into `self` (shallow merge).
    pub fn assign(&mut self, other: &Object) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

impl IntoIterator for Object {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A dynamic document value.
///
/// This covers every value kvdoc can store, including the extended types
/// (dates, regular expressions, big integers, symbols and `undefined`)
/// that are persisted through tagged strings.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value.
    Undefined,
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// IEEE-754 double.
    Number(f64),
    /// Arbitrary precision integer.
    BigInt(BigInt),
    /// Text string (UTF-8).
    Text(String),
    /// Named symbol.
    Symbol(String),
    /// Timestamp in milliseconds since the Unix epoch.
    Date(i64),
    /// Regular expression.
    RegExp(RegexLiteral),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Array of values.
    Array(Vec<Value>),
    /// Field map.
    Object(Object),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Text(a), Value::Text(b)) | (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::RegExp(a), Value::RegExp(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Name of this value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::Text(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Date(_) => "date",
            Value::RegExp(_) => "regexp",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Creates an object value from field pairs.
    pub fn object<K: Into<String>, V: Into<Value>>(fields: impl IntoIterator<Item = (K, V)>) -> Self {
        Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Check if this value is undefined.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is null or undefined.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a blob.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as an object, if it is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get this value as a mutable object, if it is one.
    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a field of an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Resolves a dotted path (`"publisher.name"`, `"tags.0"`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, segment| match current {
            Value::Object(o) => o.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Returns `true` for values that count as "true" in a boolean context.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => n.sign() != num_bigint::Sign::NoSign,
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Renders a scalar the way a string context would see it.
    ///
    /// Returns `None` for objects, arrays and blobs.
    #[must_use]
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            Value::Undefined => Some("undefined".to_string()),
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::BigInt(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Symbol(name) => Some(format!("Symbol({name})")),
            Value::Date(ms) => Some(ms.to_string()),
            Value::RegExp(r) => Some(r.to_string()),
            Value::Bytes(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Formats a number without a trailing `.0` for integral values.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<RegexLiteral> for Value {
    fn from(r: RegexLiteral) -> Self {
        Value::RegExp(r)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_literal_parse() {
        let re = RegexLiteral::parse_literal("/^tit/i").unwrap();
        assert_eq!(re.source(), "^tit");
        assert_eq!(re.flags(), "i");
        assert!(re.is_match("Title"));
        assert_eq!(re.to_string(), "/^tit/i");

        assert!(RegexLiteral::parse_literal("title").is_none());
        assert!(RegexLiteral::parse_literal("/abc").is_none());
        assert!(RegexLiteral::parse_literal("/abc/q").is_none());
        assert!(RegexLiteral::parse_literal("//").is_none());
    }

    #[test]
    fn regex_first_group() {
        let re = RegexLiteral::new("(.*) Organizations", "").unwrap();
        assert_eq!(re.first_group("Reinventing Organizations"), Some("Reinventing"));
        assert_eq!(re.first_group("nothing"), None);
    }

    #[test]
    fn regex_equality_ignores_program() {
        let a = RegexLiteral::new("a+", "g").unwrap();
        let b = RegexLiteral::new("a+", "g").unwrap();
        let c = RegexLiteral::new("a+", "i").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn object_insert_keeps_position() {
        let mut o = Object::new().with("a", 1).with("b", 2);
        assert_eq!(o.insert("a", 3), Some(Value::from(1)));
        assert_eq!(o.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(o.remove("a"), Some(Value::from(3)));
        assert_eq!(o.len(), 1);
    }

    #[test]
    fn object_equality_ignores_order_but_not_class() {
        let a = Object::new().with("x", 1).with("y", 2);
        let b = Object::new().with("y", 2).with("x", 1);
        assert_eq!(a, b);
        let mut c = b.clone();
        c.set_class(Some("Book".into()));
        assert_ne!(a, c);
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(1.0), Value::Text("1".into()));
    }

    #[test]
    fn dotted_paths() {
        let v = Value::object([
            ("publisher", Value::object([("name", "ACME")])),
            ("tags", Value::Array(vec!["a".into(), "b".into()])),
        ]);
        assert_eq!(v.get_path("publisher.name"), Some(&Value::from("ACME")));
        assert_eq!(v.get_path("tags.1"), Some(&Value::from("b")));
        assert_eq!(v.get_path("publisher.missing"), None);
        assert_eq!(v.get_path("tags.x"), None);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Object(Object::new()).is_truthy());
        assert!(!Value::Undefined.is_truthy());
    }
}
