//! Typed key tuples and range bounds.
//!
//! Keys are tuples of [`KeyPart`]s. Parts of different kinds sort by kind
//! first (`Bytes < Text < Number < BigInt < Bool`) and by value within a
//! kind, so a tuple keyspace mixing types still has one total order.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use num_bigint::BigInt;

/// A key: an ordered tuple of typed parts.
pub type Key = Vec<KeyPart>;

/// The kind of a key part, in cross-type sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyKind {
    /// Binary blob.
    Bytes,
    /// UTF-8 string.
    Text,
    /// IEEE-754 double.
    Number,
    /// Arbitrary precision integer.
    BigInt,
    /// Boolean.
    Bool,
}

impl KeyKind {
    /// The smallest kind.
    pub const FIRST: KeyKind = KeyKind::Bytes;
    /// The largest kind.
    pub const LAST: KeyKind = KeyKind::Bool;
}

/// One slot of a key tuple.
#[derive(Clone)]
pub enum KeyPart {
    /// Binary blob, compared bytewise.
    Bytes(Vec<u8>),
    /// String, compared by UTF-8 bytes.
    Text(String),
    /// Number. `-0.0` equals `0.0`; every NaN is one value sorting above `+inf`.
    Number(f64),
    /// Big integer, compared numerically.
    BigInt(BigInt),
    /// Boolean, `false < true`.
    Bool(bool),
}

impl KeyPart {
    /// Returns the kind of this part.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyPart::Bytes(_) => KeyKind::Bytes,
            KeyPart::Text(_) => KeyKind::Text,
            KeyPart::Number(_) => KeyKind::Number,
            KeyPart::BigInt(_) => KeyKind::BigInt,
            KeyPart::Bool(_) => KeyKind::Bool,
        }
    }

    /// Returns the string if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyPart::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The empty blob. Used as the encoding of absent values.
    #[must_use]
    pub fn empty() -> Self {
        KeyPart::Bytes(Vec::new())
    }
}

fn canonical(n: f64) -> f64 {
    if n.is_nan() {
        f64::NAN
    } else if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => a.cmp(b),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Number(a), KeyPart::Number(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (KeyPart::BigInt(a), KeyPart::BigInt(b)) => a.cmp(b),
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            KeyPart::Bytes(b) => b.hash(state),
            KeyPart::Text(s) => s.hash(state),
            KeyPart::Number(n) => canonical(*n).to_bits().hash(state),
            KeyPart::BigInt(n) => n.hash(state),
            KeyPart::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Debug for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bytes(b) => write!(f, "b{b:?}"),
            KeyPart::Text(s) => write!(f, "{s:?}"),
            KeyPart::Number(n) => write!(f, "{n}"),
            KeyPart::BigInt(n) => write!(f, "{n}n"),
            KeyPart::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Text(s)
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Number(n)
    }
}

impl From<i32> for KeyPart {
    fn from(n: i32) -> Self {
        KeyPart::Number(f64::from(n))
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(b: Vec<u8>) -> Self {
        KeyPart::Bytes(b)
    }
}

impl From<BigInt> for KeyPart {
    fn from(n: BigInt) -> Self {
        KeyPart::BigInt(n)
    }
}

/// One slot of a range bound.
///
/// `Min(kind)` sorts before every part of `kind` (and after every part of
/// smaller kinds); `Max(kind)` sorts after every part of `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundPart {
    /// An exact part.
    Part(KeyPart),
    /// Just below the smallest part of a kind.
    Min(KeyKind),
    /// Just above the largest part of a kind.
    Max(KeyKind),
}

impl BoundPart {
    /// Below every possible part.
    #[must_use]
    pub fn min_any() -> Self {
        BoundPart::Min(KeyKind::FIRST)
    }

    /// Above every possible part.
    #[must_use]
    pub fn max_any() -> Self {
        BoundPart::Max(KeyKind::LAST)
    }

    fn rank(&self) -> (KeyKind, u8) {
        match self {
            BoundPart::Min(kind) => (*kind, 0),
            BoundPart::Part(part) => (part.kind(), 1),
            BoundPart::Max(kind) => (*kind, 2),
        }
    }

    /// Compares a key part against this bound slot.
    #[must_use]
    pub fn cmp_part(&self, part: &KeyPart) -> Ordering {
        match self {
            BoundPart::Part(p) => p.cmp(part),
            _ => self.rank().cmp(&(part.kind(), 1)),
        }
    }
}

impl Ord for BoundPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BoundPart::Part(a), BoundPart::Part(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for BoundPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<KeyPart> for BoundPart {
    fn from(part: KeyPart) -> Self {
        BoundPart::Part(part)
    }
}

/// Compares a key against a bound tuple. A strict prefix sorts first.
#[must_use]
pub fn cmp_key_to_bound(key: &[KeyPart], bound: &[BoundPart]) -> Ordering {
    for (part, slot) in key.iter().zip(bound) {
        match slot.cmp_part(part).reverse() {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    key.len().cmp(&bound.len())
}

/// A half-open key range: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub start: Vec<BoundPart>,
    /// Exclusive upper bound.
    pub end: Vec<BoundPart>,
}

impl KeyRange {
    /// Creates a range from explicit bounds.
    #[must_use]
    pub fn new(start: Vec<BoundPart>, end: Vec<BoundPart>) -> Self {
        Self { start, end }
    }

    /// The range covering every key.
    #[must_use]
    pub fn all() -> Self {
        Self::new(vec![BoundPart::min_any()], vec![BoundPart::max_any()])
    }

    /// The range of every key that starts with `prefix` (excluding `prefix` itself).
    #[must_use]
    pub fn prefix(prefix: &[KeyPart]) -> Self {
        let mut start: Vec<BoundPart> = prefix.iter().cloned().map(BoundPart::Part).collect();
        let mut end = start.clone();
        start.push(BoundPart::min_any());
        end.push(BoundPart::max_any());
        Self::new(start, end)
    }

    /// Returns `true` if `key` lies inside the range.
    #[must_use]
    pub fn contains(&self, key: &[KeyPart]) -> bool {
        cmp_key_to_bound(key, &self.start) != Ordering::Less
            && cmp_key_to_bound(key, &self.end) == Ordering::Less
    }
}
