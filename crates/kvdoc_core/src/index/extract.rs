//! Key extraction.
//!
//! The same walk turns a stored entity into index tuples and a query
//! pattern into probe terms, so both sides line up slot for slot.
//!
//! - **Object mode** emits one tuple per leaf: `[label, label, ..., leaf]`.
//! - **Table mode** emits one tuple per declared key list:
//!   `[path, value, path, value, ...]`.

use kvdoc_codec::Value;

use crate::pattern::{FieldKey, Pattern, PatternNode, Slot, Tuple};

/// Leaf tuples of `node` in object mode.
///
/// When `schema_keys` is non-empty, subtrees that no declared key path
/// reaches are skipped. Regex field keys are always followed.
#[must_use]
pub fn object_tuples(node: &PatternNode, schema_keys: &[String]) -> Vec<Tuple> {
    let mut out = Vec::new();
    let mut labels = Vec::new();
    let mut names = Vec::new();
    walk(node, &mut labels, &mut names, false, schema_keys, &mut out);
    out
}

fn walk(
    node: &PatternNode,
    labels: &mut Vec<Slot>,
    names: &mut Vec<String>,
    regex_ancestor: bool,
    schema_keys: &[String],
    out: &mut Vec<Tuple>,
) {
    let Some(leaf) = leaf_slot(node) else {
        match node {
            PatternNode::SubPattern(pattern) => {
                for (key, child) in pattern.fields() {
                    let (label, name, is_regex) = match key {
                        FieldKey::Name(name) => (Slot::label(name), name.clone(), false),
                        FieldKey::Regex(re) => (Slot::Regex(re.clone()), re.to_string(), true),
                    };
                    names.push(name);
                    let follow = is_regex
                        || regex_ancestor
                        || schema_keys.is_empty()
                        || reaches(&names.join("."), schema_keys);
                    if follow {
                        labels.push(label);
                        walk(child, labels, names, regex_ancestor || is_regex, schema_keys, out);
                        labels.pop();
                    }
                    names.pop();
                }
            }
            PatternNode::Literal(value) => {
                walk(&PatternNode::literal_tree(value), labels, names, regex_ancestor, schema_keys, out);
            }
            _ => {}
        }
        return;
    };
    let mut tuple = labels.clone();
    tuple.push(leaf);
    out.push(tuple);
}

/// Slot for a terminal node; `None` for nodes that have children.
fn leaf_slot(node: &PatternNode) -> Option<Slot> {
    match node {
        PatternNode::Literal(Value::Object(_) | Value::Array(_)) | PatternNode::SubPattern(_) => None,
        PatternNode::Literal(value) => Some(Slot::from(value.clone())),
        PatternNode::Predicate(predicate) => Some(Slot::Test(predicate.clone())),
        PatternNode::RegexMatch(re) => Some(Slot::Regex(re.clone())),
        PatternNode::DateMatch(ms) => Some(Slot::Date(*ms)),
    }
}

/// Returns `true` when `path` lies on the way to, or below, a declared key.
fn reaches(path: &str, schema_keys: &[String]) -> bool {
    schema_keys.iter().any(|key| {
        key == path
            || key.strip_prefix(path).is_some_and(|rest| rest.starts_with('.'))
            || path.strip_prefix(key.as_str()).is_some_and(|rest| rest.starts_with('.'))
    })
}

/// The composite tuple of `node` for one table key list.
///
/// Paths that are missing or resolve to a nested structure become
/// wildcards.
#[must_use]
pub fn table_tuple(node: &PatternNode, keys: &[String]) -> Tuple {
    let root = match node {
        PatternNode::SubPattern(pattern) => Some(pattern),
        _ => None,
    };
    let mut tuple = Vec::with_capacity(keys.len() * 2);
    for key in keys {
        tuple.push(Slot::label(key));
        let resolved = root.and_then(|pattern| pattern.get_path(key));
        tuple.push(resolved.and_then(leaf_slot).unwrap_or(Slot::Any));
    }
    tuple
}

/// Root node of an entity with its primary-key field left out.
#[must_use]
pub fn entity_node(value: &Value, primary_key: &str) -> PatternNode {
    match PatternNode::literal_tree(value) {
        PatternNode::SubPattern(pattern) => PatternNode::SubPattern(without(pattern, primary_key)),
        other => other,
    }
}

/// Root node of a query pattern with its primary-key field left out.
#[must_use]
pub fn pattern_node(pattern: &Pattern, primary_key: &str) -> PatternNode {
    PatternNode::SubPattern(without(pattern.clone(), primary_key))
}

fn without(pattern: Pattern, field: &str) -> Pattern {
    let class = pattern.class().map(str::to_string);
    let base = class.map_or_else(Pattern::new, Pattern::of_class);
    pattern
        .fields()
        .iter()
        .filter(|(key, _)| !matches!(key, FieldKey::Name(name) if name == field))
        .fold(base, |acc, (key, node)| acc.field(key.clone(), node.clone()))
}
