//! Per-entity hit counting across probe terms.

use std::collections::{HashMap, HashSet};

use kvdoc_storage::Key;

/// Counts, per primary key, how many terms matched.
///
/// An entity is counted at most once per term. In strict mode only
/// entities hit by every term so far are kept; in fuzzy mode every hit
/// counts and the threshold is applied at the end.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    fuzzy: bool,
    term: usize,
    order: Vec<Key>,
    counts: HashMap<Key, usize>,
    seen: HashSet<Key>,
}

impl Tally {
    pub(crate) fn new(fuzzy: bool) -> Self {
        Self {
            fuzzy,
            ..Self::default()
        }
    }

    /// Records a hit for the current term. Returns `true` if it counted.
    pub(crate) fn hit(&mut self, id: Key) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        if self.term == 0 || self.fuzzy {
            if !self.counts.contains_key(&id) {
                self.order.push(id.clone());
            }
            *self.counts.entry(id).or_insert(0) += 1;
            true
        } else if let Some(count) = self.counts.get_mut(&id) {
            *count += 1;
            true
        } else {
            false
        }
    }

    /// Closes the current term. Returns `false` once no entity can
    /// survive any more.
    pub(crate) fn finish_term(&mut self) -> bool {
        self.seen.clear();
        self.term += 1;
        if self.fuzzy {
            return true;
        }
        let term = self.term;
        self.counts.retain(|_, count| *count == term);
        let counts = &self.counts;
        self.order.retain(|key| counts.contains_key(key));
        !self.counts.is_empty()
    }

    /// Entities whose count reaches `threshold`, in first-hit order.
    pub(crate) fn survivors(&self, threshold: f64) -> Vec<(Key, usize)> {
        self.order
            .iter()
            .filter_map(|key| {
                self.counts
                    .get(key)
                    .filter(|count| **count as f64 >= threshold)
                    .map(|count| (key.clone(), *count))
            })
            .collect()
    }
}
