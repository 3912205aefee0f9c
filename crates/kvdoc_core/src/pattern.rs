//! Query patterns, predicates and tuple slots.
//!
//! A [`Pattern`] is a tree of field constraints. Each leaf is a
//! [`PatternNode`]: a literal, a predicate, a regex test or a date test.
//! Field keys that look like `/regex/flags` match every field whose name
//! matches.
//!
//! The key extractor flattens patterns (and entities) into tuples of
//! [`Slot`]s, which is what index entries and probe terms are made of.

use std::fmt;
use std::sync::Arc;

use kvdoc_codec::{index_part, tag_scalar, CodecError, CodecResult, Object, RegexLiteral, Value};
use kvdoc_storage::KeyPart;

/// Result of applying a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The value matched. `value` is what the predicate hands back
    /// (usually the input) and `score` its confidence in `0.0..=1.0`.
    Match {
        /// Returned value.
        value: Value,
        /// Confidence.
        score: f64,
    },
    /// The value did not match.
    NoMatch,
    /// The value did not match, and no value after it in key order can.
    Stop,
}

impl Outcome {
    /// A full-confidence match returning `value`.
    #[must_use]
    pub fn matched(value: Value) -> Self {
        Outcome::Match { value, score: 1.0 }
    }

    /// A match with an explicit confidence.
    #[must_use]
    pub fn scored(value: Value, score: f64) -> Self {
        Outcome::Match { value, score }
    }

    /// Returns `true` for [`Outcome::Match`].
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match { .. })
    }

    /// Confidence of a match.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            Outcome::Match { score, .. } => Some(*score),
            _ => None,
        }
    }

    /// The returned value of a match.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Match { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<Option<Value>> for Outcome {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Outcome::NoMatch, Outcome::matched)
    }
}

type TestFn = dyn Fn(&Value) -> Outcome + Send + Sync;

/// A named, shareable test over a single value.
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    test: Arc<TestFn>,
}

impl Predicate {
    /// Wraps a test function.
    pub fn new(name: &str, test: impl Fn(&Value) -> Outcome + Send + Sync + 'static) -> Self {
        Self {
            name: Arc::from(name),
            test: Arc::new(test),
        }
    }

    /// Wraps a function that returns a value on success and `None` otherwise.
    pub fn from_fn(f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::new("fn", move |value| f(value).into())
    }

    /// Applies the test.
    #[must_use]
    pub fn test(&self, value: &Value) -> Outcome {
        (self.test)(value)
    }

    /// Name used in debug output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

/// A field key: a literal name or a regex over names.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKey {
    /// Exact field name.
    Name(String),
    /// Any field whose name matches.
    Regex(RegexLiteral),
}

impl FieldKey {
    /// Parses `/source/flags` as a regex key and anything else as a name.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        RegexLiteral::parse_literal(text)
            .map_or_else(|| FieldKey::Name(text.to_string()), FieldKey::Regex)
    }

    /// Returns `true` if a field called `name` is selected by this key.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            FieldKey::Name(own) => own == name,
            FieldKey::Regex(re) => re.is_match(name),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(text: &str) -> Self {
        FieldKey::parse(text)
    }
}

impl From<String> for FieldKey {
    fn from(text: String) -> Self {
        FieldKey::parse(&text)
    }
}

impl From<RegexLiteral> for FieldKey {
    fn from(re: RegexLiteral) -> Self {
        FieldKey::Regex(re)
    }
}

/// One node of a pattern tree.
#[derive(Debug, Clone)]
pub enum PatternNode {
    /// Strict equality (`undefined` is a wildcard).
    Literal(Value),
    /// Delegates to a predicate.
    Predicate(Predicate),
    /// Tests string values.
    RegexMatch(RegexLiteral),
    /// Matches dates with the same timestamp.
    DateMatch(i64),
    /// Constrains the fields of a nested object.
    SubPattern(Pattern),
}

impl PatternNode {
    /// Reads a value as a pattern: regex values test, dates compare by
    /// time, nested objects become sub-patterns and `/regex/` field names
    /// become regex keys.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::RegExp(re) => PatternNode::RegexMatch(re.clone()),
            Value::Date(ms) => PatternNode::DateMatch(*ms),
            Value::Object(object) => PatternNode::SubPattern(Pattern::from_object(object)),
            Value::Array(items) => PatternNode::SubPattern(Pattern {
                class: None,
                fields: items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (FieldKey::Name(i.to_string()), PatternNode::from_value(item)))
                    .collect(),
            }),
            other => PatternNode::Literal(other.clone()),
        }
    }

    /// Reads a stored entity as a literal tree. Every leaf, including
    /// regex and date values, stays a literal, and field names are taken
    /// verbatim.
    #[must_use]
    pub fn literal_tree(value: &Value) -> Self {
        let nested = |fields: Vec<(String, &Value)>| {
            PatternNode::SubPattern(Pattern {
                class: None,
                fields: fields
                    .into_iter()
                    .map(|(name, v)| (FieldKey::Name(name), PatternNode::literal_tree(v)))
                    .collect(),
            })
        };
        match value {
            Value::Object(object) => nested(object.iter().map(|(k, v)| (k.to_string(), v)).collect()),
            Value::Array(items) => nested(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
            ),
            other => PatternNode::Literal(other.clone()),
        }
    }
}

impl From<Value> for PatternNode {
    fn from(value: Value) -> Self {
        PatternNode::from_value(&value)
    }
}

impl From<Predicate> for PatternNode {
    fn from(predicate: Predicate) -> Self {
        PatternNode::Predicate(predicate)
    }
}

impl From<Pattern> for PatternNode {
    fn from(pattern: Pattern) -> Self {
        PatternNode::SubPattern(pattern)
    }
}

impl From<RegexLiteral> for PatternNode {
    fn from(re: RegexLiteral) -> Self {
        PatternNode::RegexMatch(re)
    }
}

impl From<&str> for PatternNode {
    fn from(text: &str) -> Self {
        PatternNode::Literal(Value::from(text))
    }
}

impl From<String> for PatternNode {
    fn from(text: String) -> Self {
        PatternNode::Literal(Value::Text(text))
    }
}

impl From<f64> for PatternNode {
    fn from(n: f64) -> Self {
        PatternNode::Literal(Value::Number(n))
    }
}

impl From<i32> for PatternNode {
    fn from(n: i32) -> Self {
        PatternNode::Literal(Value::from(n))
    }
}

impl From<i64> for PatternNode {
    fn from(n: i64) -> Self {
        PatternNode::Literal(Value::from(n))
    }
}

impl From<bool> for PatternNode {
    fn from(b: bool) -> Self {
        PatternNode::Literal(Value::Bool(b))
    }
}

/// An object pattern.
///
/// # Example
///
/// ```rust
/// use kvdoc_core::{ops, Pattern};
///
/// let pattern = Pattern::of_class("Book")
///     .field("author", ops::echoes("Lalox"))
///     .field("/^tit/", "Reinventing Organizations");
/// assert_eq!(pattern.class(), Some("Book"));
/// assert_eq!(pattern.fields().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    class: Option<String>,
    fields: Vec<(FieldKey, PatternNode)>,
}

impl Pattern {
    /// An empty untagged pattern.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty pattern whose collection is `cname`.
    #[must_use]
    pub fn of_class(cname: impl Into<String>) -> Self {
        Self {
            class: Some(cname.into()),
            fields: Vec::new(),
        }
    }

    /// Builds a pattern from an object value.
    #[must_use]
    pub fn from_object(object: &Object) -> Self {
        Self {
            class: object.class().map(str::to_string),
            fields: object
                .iter()
                .map(|(k, v)| (FieldKey::parse(k), PatternNode::from_value(v)))
                .collect(),
        }
    }

    /// Builds a pattern from a value; `None` unless it is an object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(Self::from_object)
    }

    /// Adds a field constraint.
    #[must_use]
    pub fn field(mut self, key: impl Into<FieldKey>, node: impl Into<PatternNode>) -> Self {
        self.fields.push((key.into(), node.into()));
        self
    }

    /// The collection this pattern targets.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Field constraints in order.
    #[must_use]
    pub fn fields(&self) -> &[(FieldKey, PatternNode)] {
        &self.fields
    }

    /// The node stored under a literal field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PatternNode> {
        self.fields.iter().find_map(|(key, node)| match key {
            FieldKey::Name(own) if own == name => Some(node),
            _ => None,
        })
    }

    /// Resolves a dotted path through nested sub-patterns.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&PatternNode> {
        let mut segments = path.split('.');
        let first = self.get(segments.next()?)?;
        segments.try_fold(first, |node, segment| match node {
            PatternNode::SubPattern(inner) => inner.get(segment),
            _ => None,
        })
    }
}

impl From<Object> for Pattern {
    fn from(object: Object) -> Self {
        Pattern::from_object(&object)
    }
}

/// One position of an index tuple or probe term.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A literal value (also used for field labels).
    Exact(Value),
    /// Any value a regex accepts (field names or string values).
    Regex(RegexLiteral),
    /// A date with this timestamp.
    Date(i64),
    /// Any value the predicate accepts.
    Test(Predicate),
    /// Anything.
    Any,
}

/// A flattened tuple of slots.
pub type Tuple = Vec<Slot>;

impl Slot {
    /// A field label.
    #[must_use]
    pub fn label(name: &str) -> Self {
        Slot::Exact(Value::from(name))
    }

    /// The key part this slot pins a range scan to, if it pins one.
    #[must_use]
    pub fn bound_part(&self) -> Option<KeyPart> {
        match self {
            Slot::Exact(Value::Undefined) => None,
            Slot::Exact(value) => index_part(value).ok(),
            Slot::Date(ms) => tag_scalar(&Value::Date(*ms)).map(KeyPart::Text),
            Slot::Regex(_) | Slot::Test(_) | Slot::Any => None,
        }
    }

    /// The key part written for this slot in an index entry.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] for predicates and for values
    /// that cannot sit in a key.
    pub fn index_part(&self) -> CodecResult<KeyPart> {
        match self {
            Slot::Exact(value) => index_part(value),
            Slot::Regex(re) => Ok(KeyPart::Text(format!("@RegExp({re})"))),
            Slot::Date(ms) => Ok(KeyPart::Text(format!("@Date({ms})"))),
            Slot::Any => Ok(KeyPart::empty()),
            Slot::Test(_) => Err(CodecError::type_mismatch("predicate", "in index entry")),
        }
    }

    /// Returns `true` for slots that pin a single key part.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.bound_part().is_some()
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined => Slot::Any,
            other => Slot::Exact(other),
        }
    }
}

impl From<Predicate> for Slot {
    fn from(predicate: Predicate) -> Self {
        Slot::Test(predicate)
    }
}

impl From<&str> for Slot {
    fn from(text: &str) -> Self {
        Slot::Exact(Value::from(text))
    }
}

impl From<f64> for Slot {
    fn from(n: f64) -> Self {
        Slot::Exact(Value::Number(n))
    }
}

impl From<i32> for Slot {
    fn from(n: i32) -> Self {
        Slot::Exact(Value::from(n))
    }
}

impl From<bool> for Slot {
    fn from(b: bool) -> Self {
        Slot::Exact(Value::Bool(b))
    }
}
