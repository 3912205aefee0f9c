//! Query engine.
//!
//! `find` turns a query into probe terms, scans one key range per term,
//! merges the hits into a per-entity tally and then lazily fetches,
//! filters and projects the survivors through a [`Cursor`].
//!
//! Without `min_score` the terms are intersected (logical AND). With
//! `min_score` every hit counts and an entity survives when at least
//! `min_score × terms` of its terms matched.

mod cursor;
mod plan;
mod tally;

use std::collections::HashMap;

use kvdoc_codec::{from_key_part, Object, Value};
use kvdoc_storage::{Key, KeyKind, KeyPart, OrderedStore, Versionstamp};
use tracing::{debug, trace};

use crate::database::Database;
use crate::entity::{cname_of, is_id};
use crate::error::{CoreError, CoreResult};
use crate::matcher::{match_keys, KeyMatch};
use crate::metadata::Metadata;
use crate::pattern::{Pattern, Predicate, Slot};
use crate::selector::Selector;

pub use cursor::Cursor;
use plan::{Layout, Plan, ProbeTerm, Source};
use tally::Tally;

/// What to look for.
#[derive(Debug, Clone)]
pub enum Query {
    /// Every entity (of the collection, when one is given).
    All,
    /// Raw keys matching a tuple; predicate slots test each position.
    Key(Vec<Slot>),
    /// Entities matching an object pattern, through the indexes.
    Pattern(Pattern),
}

impl From<Pattern> for Query {
    fn from(pattern: Pattern) -> Self {
        Query::Pattern(pattern)
    }
}

impl From<Object> for Query {
    fn from(object: Object) -> Self {
        Query::Pattern(Pattern::from_object(&object))
    }
}

impl From<Vec<Slot>> for Query {
    fn from(slots: Vec<Slot>) -> Self {
        Query::Key(slots)
    }
}

impl From<Value> for Query {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined | Value::Null => Query::All,
            Value::Object(object) => Query::from(object),
            Value::Array(items) => Query::Key(items.into_iter().map(Slot::from).collect()),
            scalar => Query::Key(vec![Slot::from(scalar)]),
        }
    }
}

/// Post-filter applied to fetched values.
#[derive(Debug, Clone)]
pub enum ValueMatch {
    /// Deep pattern match; the match score multiplies the hit score.
    Pattern(Pattern),
    /// Predicate over the whole value.
    Predicate(Predicate),
}

/// Options for `find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Collection to search.
    pub cname: Option<String>,
    /// Search one named index of `cname` instead of the object indexes.
    pub index_name: Option<String>,
    /// Fuzzy mode: minimum fraction of matching terms.
    pub min_score: Option<f64>,
    /// Filter over fetched values.
    pub value_match: Option<ValueMatch>,
    /// Projection applied to yielded values.
    pub select: Option<Selector>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of candidates to skip.
    pub offset: usize,
}

impl FindOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection.
    #[must_use]
    pub fn cname(mut self, cname: impl Into<String>) -> Self {
        self.cname = Some(cname.into());
        self
    }

    /// Searches a named index.
    #[must_use]
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Enables fuzzy matching.
    #[must_use]
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Filters fetched values with a pattern.
    #[must_use]
    pub fn value_match(mut self, pattern: Pattern) -> Self {
        self.value_match = Some(ValueMatch::Pattern(pattern));
        self
    }

    /// Filters fetched values with a predicate.
    #[must_use]
    pub fn value_test(mut self, predicate: Predicate) -> Self {
        self.value_match = Some(ValueMatch::Predicate(predicate));
        self
    }

    /// Projects yielded values.
    #[must_use]
    pub fn select(mut self, selector: Selector) -> Self {
        self.select = Some(selector);
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips candidates.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// One result of `find`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Entity id or raw key.
    pub key: Value,
    /// Stored (and possibly projected) value.
    pub value: Value,
    /// Metadata envelope.
    pub metadata: Metadata,
    /// Version of the primary record.
    pub versionstamp: Versionstamp,
    /// Relevance in `0.0..=1.0`.
    pub score: f64,
    /// Position of this candidate among all survivors.
    pub offset: usize,
    /// Running number of yielded results, starting at 1.
    pub count: usize,
    /// Number of candidates that passed the score threshold.
    pub total_count: usize,
}

pub(crate) fn execute<'db>(db: &'db Database, query: &Query, options: FindOptions) -> CoreResult<Cursor<'db>> {
    let plan = Plan::build(&db.registry(), db.config(), query, &options)?;
    let store = db.store();
    let mut tally = Tally::new(options.min_score.is_some());
    let mut stale: HashMap<Key, Vec<Key>> = HashMap::new();

    match &plan.source {
        Source::Direct(keys) => {
            for key in keys {
                tally.hit(key.clone());
            }
        }
        Source::Primary(range) => {
            for item in store.list(range, None) {
                let entry = item?;
                if matches!(entry.key.as_slice(), [KeyPart::Text(id)] if is_id(id)) {
                    tally.hit(entry.key);
                }
            }
        }
        Source::Terms(terms) => {
            for term in terms {
                scan_term(store, plan.layout, term, &mut tally, &mut stale)?;
                if !tally.finish_term() {
                    break;
                }
            }
        }
    }

    let threshold = options
        .min_score
        .map_or(plan.term_count as f64, |min| min * plan.term_count as f64);
    let mut survivors = tally.survivors(threshold);
    if plan.layout != Layout::Raw {
        if let Some(cname) = &plan.cname {
            survivors.retain(|(key, _)| primary_id(key).and_then(cname_of).as_deref() == Some(cname.as_str()));
        }
    }
    if let Some(id) = &plan.id_filter {
        survivors.retain(|(key, _)| primary_id(key) == Some(id.as_str()));
    }
    debug!(
        terms = plan.term_count,
        candidates = survivors.len(),
        "find planned"
    );
    Ok(Cursor::new(db, survivors, stale, plan.term_count, options))
}

fn primary_id(key: &[KeyPart]) -> Option<&str> {
    match key {
        [KeyPart::Text(id)] => Some(id),
        _ => None,
    }
}

fn scan_term(
    store: &dyn OrderedStore,
    layout: Layout,
    term: &ProbeTerm,
    tally: &mut Tally,
    stale: &mut HashMap<Key, Vec<Key>>,
) -> CoreResult<()> {
    let mut seen = 0usize;
    let mut matched = 0usize;
    let mut pruned: Option<KeyKind> = None;
    for item in store.list(&term.range, None) {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) if err.is_boundary() && (seen == 0 || matched > 0) => break,
            Err(err) => return Err(CoreError::from(err)),
        };
        seen += 1;
        let Some((id, candidate)) = layout.split(&entry.key) else {
            continue;
        };
        trace!(key = ?entry.key, "probe candidate");
        if let (Some(kind), Some(at)) = (pruned, term.first_open) {
            if candidate.get(at).map(KeyPart::kind) == Some(kind) {
                continue;
            }
        }
        match match_keys(&term.slots, candidate) {
            KeyMatch::Match(_) => {
                matched += 1;
                if layout != Layout::Raw {
                    stale.entry(id.clone()).or_default().push(entry.key.clone());
                }
                tally.hit(id);
            }
            KeyMatch::Stop { slot } if Some(slot) == term.first_open => {
                if let Some(part) = candidate.get(slot).filter(|part| sorts_like_value(part)) {
                    pruned = Some(part.kind());
                }
            }
            KeyMatch::Stop { .. } | KeyMatch::NoMatch => {}
        }
    }
    Ok(())
}

/// Whether key order over parts of this kind follows value order.
///
/// Tagged text (dates, regular expressions) sorts by its bytes, so a `Stop`
/// on it says nothing about the candidates that follow.
fn sorts_like_value(part: &KeyPart) -> bool {
    match part {
        KeyPart::Number(_) | KeyPart::BigInt(_) | KeyPart::Bool(_) => true,
        KeyPart::Text(_) => matches!(from_key_part(part), Value::Text(_)),
        KeyPart::Bytes(_) => false,
    }
}
