//! Tuple and value matching.

use kvdoc_codec::{from_key_part, Value};
use kvdoc_storage::KeyPart;

use crate::index::extract::object_tuples;
use crate::pattern::{Outcome, Pattern, PatternNode, Slot};

/// Result of testing a candidate key against a probe term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyMatch {
    /// Every slot matched; the product of predicate scores.
    Match(f64),
    /// Some slot did not match.
    NoMatch,
    /// A predicate at `slot` reported that later values cannot match.
    Stop {
        /// Position of the stopping slot.
        slot: usize,
    },
}

/// Tests `candidate` position by position against `term`.
///
/// Literal slots compare encoded key parts, date slots compare
/// timestamps, regex slots test the candidate's string form and predicate
/// slots run against the decoded candidate.
#[must_use]
pub fn match_keys(term: &[Slot], candidate: &[KeyPart]) -> KeyMatch {
    if term.len() != candidate.len() {
        return KeyMatch::NoMatch;
    }
    let mut score = 1.0;
    for (i, (slot, part)) in term.iter().zip(candidate).enumerate() {
        match slot {
            Slot::Any | Slot::Exact(Value::Undefined) => {}
            Slot::Exact(_) => {
                if slot.index_part().ok().as_ref() != Some(part) {
                    return KeyMatch::NoMatch;
                }
            }
            Slot::Date(ms) => {
                if from_key_part(part) != Value::Date(*ms) {
                    return KeyMatch::NoMatch;
                }
            }
            Slot::Regex(re) => {
                let text = from_key_part(part).to_display_string();
                if !text.is_some_and(|text| re.is_match(&text)) {
                    return KeyMatch::NoMatch;
                }
            }
            Slot::Test(predicate) => match predicate.test(&from_key_part(part)) {
                Outcome::Match { score: s, .. } => score *= s,
                Outcome::NoMatch => return KeyMatch::NoMatch,
                Outcome::Stop => return KeyMatch::Stop { slot: i },
            },
        }
    }
    KeyMatch::Match(score)
}

/// Deep-matches `target` against `pattern`.
///
/// Every leaf term of the pattern must match some leaf of the target.
/// Returns the product of the first matching score per term, or `None`.
#[must_use]
pub fn match_value(pattern: &Pattern, target: &Value) -> Option<f64> {
    if let (Some(class), Some(object)) = (pattern.class(), target.as_object()) {
        if object.class().is_some_and(|own| own != class) {
            return None;
        }
    }
    let terms = object_tuples(&PatternNode::SubPattern(pattern.clone()), &[]);
    let leaves: Vec<Vec<KeyPart>> = object_tuples(&PatternNode::literal_tree(target), &[])
        .iter()
        .filter_map(|tuple| tuple.iter().map(|slot| slot.index_part().ok()).collect())
        .collect();
    terms.iter().try_fold(1.0, |acc, term| {
        leaves.iter().find_map(|leaf| match match_keys(term, leaf) {
            KeyMatch::Match(score) => Some(acc * score),
            _ => None,
        })
    })
}
