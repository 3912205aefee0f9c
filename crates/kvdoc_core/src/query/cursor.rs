//! Lazy result iteration.

use std::collections::HashMap;

use kvdoc_storage::Key;

use crate::database::Database;
use crate::error::CoreResult;
use crate::matcher::match_value;
use crate::pattern::Outcome;
use crate::query::{FindOptions, Hit, ValueMatch};
use crate::selector::{select, Selector};

/// Iterator over the results of `find`.
///
/// Candidates are fetched one at a time. Candidates whose primary record
/// is gone are skipped and their stale index entries removed.
pub struct Cursor<'db> {
    db: &'db Database,
    candidates: std::vec::IntoIter<(Key, usize)>,
    stale: HashMap<Key, Vec<Key>>,
    term_count: usize,
    fuzzy: bool,
    value_match: Option<ValueMatch>,
    select: Option<Selector>,
    limit: Option<usize>,
    offset: usize,
    count: usize,
    total_count: usize,
}

impl<'db> Cursor<'db> {
    pub(crate) fn new(
        db: &'db Database,
        survivors: Vec<(Key, usize)>,
        stale: HashMap<Key, Vec<Key>>,
        term_count: usize,
        options: FindOptions,
    ) -> Self {
        let total_count = survivors.len();
        let candidates: Vec<(Key, usize)> = survivors.into_iter().skip(options.offset).collect();
        Self {
            db,
            candidates: candidates.into_iter(),
            stale,
            term_count,
            fuzzy: options.min_score.is_some(),
            value_match: options.value_match,
            select: options.select,
            limit: options.limit,
            offset: options.offset,
            count: 0,
            total_count,
        }
    }

    /// Number of candidates that passed the score threshold.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    fn score(&self, hits: usize) -> f64 {
        if self.fuzzy && self.term_count > 0 {
            hits as f64 / self.term_count as f64
        } else {
            1.0
        }
    }
}

impl Iterator for Cursor<'_> {
    type Item = CoreResult<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit.is_some_and(|limit| self.count >= limit) {
                return None;
            }
            let (key, hits) = self.candidates.next()?;
            let offset = self.offset;
            self.offset += 1;

            let entry = match self.db.read_live(&key) {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            let Some(entry) = entry else {
                if let Some(stale) = self.stale.remove(&key) {
                    if let Err(err) = self.db.collect_dangling(&key, &stale) {
                        return Some(Err(err));
                    }
                }
                continue;
            };

            let mut score = self.score(hits);
            match &self.value_match {
                Some(ValueMatch::Pattern(pattern)) => match match_value(pattern, &entry.value) {
                    Some(s) => score *= s,
                    None => continue,
                },
                Some(ValueMatch::Predicate(predicate)) => match predicate.test(&entry.value) {
                    Outcome::Match { score: s, .. } => score *= s,
                    Outcome::NoMatch | Outcome::Stop => continue,
                },
                None => {}
            }
            let value = match &self.select {
                Some(selector) => match select(&entry.value, selector) {
                    Some(value) => value,
                    None => continue,
                },
                None => entry.value,
            };

            self.count += 1;
            return Some(Ok(Hit {
                key: entry.key,
                value,
                metadata: entry.metadata,
                versionstamp: entry.versionstamp,
                score,
                offset,
                count: self.count,
                total_count: self.total_count,
            }));
        }
    }
}
