//! Change feed for observing completed writes.
//!
//! The change feed emits one event per outermost `put`, `patch`, `set`
//! and `delete`, enabling:
//! - Reactive updates
//! - Audit logging
//! - Cache invalidation
//!
//! # Usage
//!
//! ```rust
//! use kvdoc_core::{ChangeKind, Database, SubscriptionFilter, Value};
//!
//! let db = Database::open_in_memory();
//! let receiver = db.subscribe(SubscriptionFilter::kinds([ChangeKind::Set]));
//!
//! db.set(&Value::from("greeting"), Value::from("hello")).unwrap();
//! let event = receiver.try_recv().unwrap();
//! assert_eq!(event.kind, ChangeKind::Set);
//! assert_eq!(event.value, Value::from("hello"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use kvdoc_codec::Value;
use parking_lot::RwLock;

use crate::matcher::match_value;
use crate::metadata::Metadata;
use crate::pattern::Pattern;

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A document was written with index maintenance.
    Put,
    /// A document was merged.
    Patch,
    /// A raw key was written.
    Set,
    /// A key or document was removed.
    Delete,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Position in emit order, starting at 1.
    pub sequence: u64,
    /// Kind of write.
    pub kind: ChangeKind,
    /// Entity id or raw key.
    pub key: Value,
    /// Collection of the written document, if known.
    pub cname: Option<String>,
    /// Written value (the removed key for deletes).
    pub value: Value,
    /// Metadata written alongside the value.
    pub metadata: Option<Metadata>,
}

impl ChangeEvent {
    /// Creates an event; the feed assigns the sequence on emit.
    #[must_use]
    pub fn new(kind: ChangeKind, key: Value, value: Value) -> Self {
        Self {
            sequence: 0,
            kind,
            key,
            cname: None,
            value,
            metadata: None,
        }
    }

    /// Sets the collection.
    #[must_use]
    pub fn with_cname(mut self, cname: Option<&str>) -> Self {
        self.cname = cname.map(str::to_string);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.metadata = (!metadata.is_empty()).then(|| metadata.clone());
        self
    }
}

/// Which events a subscriber receives.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    /// Accepted kinds; empty accepts all.
    pub kinds: Vec<ChangeKind>,
    /// Only events of this collection.
    pub cname: Option<String>,
    /// Only events whose value matches.
    pub pattern: Option<Pattern>,
}

impl SubscriptionFilter {
    /// Accepts every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accepts the given kinds.
    pub fn kinds(kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restricts to one collection.
    #[must_use]
    pub fn cname(mut self, cname: impl Into<String>) -> Self {
        self.cname = Some(cname.into());
        self
    }

    /// Restricts to values matching `pattern`.
    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Returns `true` if `event` passes the filter.
    #[must_use]
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && self
                .cname
                .as_deref()
                .map_or(true, |cname| event.cname.as_deref() == Some(cname))
            && self
                .pattern
                .as_ref()
                .map_or(true, |pattern| match_value(pattern, &event.value).is_some())
    }
}

/// Distributes completed writes to subscribers.
///
/// The change feed:
/// - Emits events in write order
/// - Supports multiple filtered subscribers
/// - Keeps a bounded history for polling
/// - Is thread-safe
pub struct ChangeFeed {
    subscribers: RwLock<Vec<(SubscriptionFilter, Sender<ChangeEvent>)>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
    sequence: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates a change feed with a specific history limit.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribes to events passing `filter`.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push((filter, tx));
        rx
    }

    /// Assigns the next sequence number and delivers `event`.
    pub fn emit(&self, mut event: ChangeEvent) {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(0..excess);
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|(filter, tx)| !filter.accepts(&event) || tx.send(event.clone()).is_ok());
    }

    /// Events with sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The latest emitted sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn put(cname: &str, value: Value) -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Put, Value::from("id"), value).with_cname(Some(cname))
    }

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe(SubscriptionFilter::all());

        feed.emit(put("Book", Value::from(1)));

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.value, Value::from(1));
    }

    #[test]
    fn filters_by_kind_and_cname() {
        let feed = ChangeFeed::new();
        let deletes = feed.subscribe(SubscriptionFilter::kinds([ChangeKind::Delete]));
        let books = feed.subscribe(SubscriptionFilter::all().cname("Book"));

        feed.emit(put("Person", Value::from(1)));
        feed.emit(put("Book", Value::from(2)));

        assert!(deletes.try_recv().is_err());
        assert_eq!(books.try_recv().unwrap().value, Value::from(2));
        assert!(books.try_recv().is_err());
    }

    #[test]
    fn filters_by_pattern() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe(SubscriptionFilter::all().pattern(Pattern::new().field("author", "Laloux")));

        feed.emit(put("Book", Value::object([("author", "Jones")])));
        feed.emit(put("Book", Value::object([("author", "Laloux")])));

        assert_eq!(rx.try_recv().unwrap().sequence, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe(SubscriptionFilter::all());
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(put("Book", Value::Null));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn poll_from_cursor() {
        let feed = ChangeFeed::with_max_history(3);
        for i in 1..=5 {
            feed.emit(put("Book", Value::from(i)));
        }
        let events = feed.poll(3, 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 4);
        assert_eq!(feed.poll(0, 10).len(), 3);
        assert_eq!(feed.latest_sequence(), 5);
    }

    #[test]
    fn threaded_subscribe() {
        let feed = Arc::new(ChangeFeed::new());
        let rx = feed.subscribe(SubscriptionFilter::all());

        let feed_clone = Arc::clone(&feed);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            feed_clone.emit(put("Book", Value::from(42)));
        });

        let received = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(received.value, Value::from(42));

        handle.join().unwrap();
    }
}
