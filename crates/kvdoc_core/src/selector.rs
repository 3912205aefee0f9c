//! Structural projection of result values.
//!
//! A [`Selector`] mirrors the shape of the value it projects. Fields the
//! selector does not mention are dropped, and each mentioned field is
//! projected by its node:
//!
//! | Node | Result |
//! |------|--------|
//! | `Literal(v)` | the field if it equals `v` (`NaN` matches `NaN`) |
//! | `Regex(re)` | first capture group of a string field |
//! | `Date(ms)` | the field if it is a date with that timestamp |
//! | `Transform(f)` | whatever `f` returns |
//! | `Nested(s)` | the field projected by `s` |
//! | `Keep` | the field unchanged |
//!
//! A node that yields nothing removes the field from its parent.

use std::fmt;
use std::sync::Arc;

use kvdoc_codec::{Object, RegexLiteral, Value};

use crate::pattern::FieldKey;

/// Where a transformed value sits.
#[derive(Debug, Clone, Copy)]
pub struct SelectContext<'a> {
    /// The value passed to [`select`].
    pub root: &'a Value,
    /// The object or array holding the field.
    pub parent: &'a Value,
    /// The field name.
    pub key: &'a str,
}

type TransformFn = dyn Fn(&Value, &SelectContext<'_>) -> Option<Value> + Send + Sync;

/// A field transform.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    /// Wraps a transform function.
    pub fn new(f: impl Fn(&Value, &SelectContext<'_>) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

/// One projection node.
#[derive(Debug, Clone)]
pub enum SelectNode {
    /// Keep the field only if it equals this value.
    Literal(Value),
    /// Replace a string field with the first capture group.
    Regex(RegexLiteral),
    /// Keep a date field with this timestamp.
    Date(i64),
    /// Compute a new value.
    Transform(Transform),
    /// Project a nested structure.
    Nested(Selector),
    /// Keep the field as is.
    Keep,
}

impl From<Value> for SelectNode {
    fn from(value: Value) -> Self {
        match value {
            Value::RegExp(re) => SelectNode::Regex(re),
            Value::Date(ms) => SelectNode::Date(ms),
            Value::Object(object) => SelectNode::Nested(Selector::from_object(&object)),
            other => SelectNode::Literal(other),
        }
    }
}

impl From<Selector> for SelectNode {
    fn from(selector: Selector) -> Self {
        SelectNode::Nested(selector)
    }
}

impl From<Transform> for SelectNode {
    fn from(transform: Transform) -> Self {
        SelectNode::Transform(transform)
    }
}

impl From<RegexLiteral> for SelectNode {
    fn from(re: RegexLiteral) -> Self {
        SelectNode::Regex(re)
    }
}

impl From<&str> for SelectNode {
    fn from(text: &str) -> Self {
        SelectNode::Literal(Value::from(text))
    }
}

/// A projection.
///
/// ```rust
/// use kvdoc_core::{select, Selector, Transform, Value};
///
/// let book = Value::object([("#", "Book@1"), ("title", "T"), ("author", "A")]);
/// let upper = Transform::new(|v, _| v.as_text().map(|s| Value::from(s.to_uppercase())));
/// let projected = select(&book, &Selector::new().field("title", upper)).unwrap();
/// assert_eq!(projected, Value::object([("title", "T")]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Selector {
    fields: Vec<(FieldKey, SelectNode)>,
}

impl Selector {
    /// An empty selector; it drops every field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an object value as a selector.
    #[must_use]
    pub fn from_object(object: &Object) -> Self {
        Self {
            fields: object
                .iter()
                .map(|(k, v)| (FieldKey::parse(k), SelectNode::from(v.clone())))
                .collect(),
        }
    }

    /// Adds a projected field.
    #[must_use]
    pub fn field(mut self, key: impl Into<FieldKey>, node: impl Into<SelectNode>) -> Self {
        self.fields.push((key.into(), node.into()));
        self
    }

    /// Adds a field that is kept unchanged.
    #[must_use]
    pub fn keep(self, key: impl Into<FieldKey>) -> Self {
        self.field(key, SelectNode::Keep)
    }

    fn references(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key.matches(name))
    }
}

/// Projects `value` through `selector`.
///
/// Returns `None` when the value does not fit the selector at all.
#[must_use]
pub fn select(value: &Value, selector: &Selector) -> Option<Value> {
    project_structure(value, selector, value)
}

fn project_structure(value: &Value, selector: &Selector, root: &Value) -> Option<Value> {
    let entries: Vec<(String, Value)> = match value {
        Value::Object(object) => object.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => return None,
    };
    let mut projected: Vec<(String, Option<Value>)> = entries
        .into_iter()
        .filter(|(key, _)| selector.references(key))
        .map(|(key, v)| (key, Some(v)))
        .collect();

    for (field, node) in &selector.fields {
        match field {
            FieldKey::Regex(re) => {
                for (key, slot) in projected.iter_mut().filter(|(key, _)| re.is_match(key)) {
                    if let Some(current) = slot.take() {
                        let ctx = SelectContext { root, parent: value, key };
                        *slot = project(&current, node, &ctx);
                    }
                }
            }
            FieldKey::Name(name) => match projected.iter().position(|(key, _)| key == name) {
                Some(at) => {
                    let (key, slot) = &mut projected[at];
                    if let Some(current) = slot.take() {
                        let ctx = SelectContext { root, parent: value, key };
                        *slot = project(&current, node, &ctx);
                    }
                }
                None => {
                    if let SelectNode::Transform(transform) = node {
                        let ctx = SelectContext { root, parent: value, key: name };
                        if let Some(created) = (transform.0)(&Value::Undefined, &ctx) {
                            projected.push((name.clone(), Some(created)));
                        }
                    }
                }
            },
        }
    }

    let kept = projected.into_iter().filter_map(|(key, v)| v.map(|v| (key, v)));
    Some(match value {
        Value::Object(object) => {
            let mut out: Object = kept.collect();
            out.set_class(object.class().map(str::to_string));
            Value::Object(out)
        }
        _ => Value::Array(kept.map(|(_, v)| v).collect()),
    })
}

fn project(value: &Value, node: &SelectNode, ctx: &SelectContext<'_>) -> Option<Value> {
    match node {
        SelectNode::Keep => Some(value.clone()),
        SelectNode::Transform(transform) => (transform.0)(value, ctx),
        SelectNode::Nested(selector) => project_structure(value, selector, ctx.root),
        SelectNode::Regex(re) => value
            .as_text()
            .and_then(|text| re.first_group(text))
            .map(Value::from),
        SelectNode::Date(ms) => matches!(value, Value::Date(own) if own == ms).then(|| value.clone()),
        SelectNode::Literal(expected) => (value == expected).then(|| value.clone()),
    }
}
