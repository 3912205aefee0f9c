//! Query planning: probe terms and the key ranges they scan.

use kvdoc_storage::{BoundPart, Key, KeyKind, KeyPart, KeyRange};

use crate::config::Config;
use crate::entity::{cname_of, id_range_end, id_range_start};
use crate::error::{CoreError, CoreResult};
use crate::index::extract::pattern_node;
use crate::index::{object_tuples, table_tuple, IndexType, Registry, OBJECT_INDEX_PREFIX, TABLE_INDEX_PREFIX};
use crate::pattern::{PatternNode, Slot};
use crate::query::{FindOptions, Query};

/// Shape of the keys a term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// `[__oindex__, label..., leaf, id]`
    Object,
    /// `[__tindex__, path, value, ..., id]`
    Table,
    /// Raw store keys.
    Raw,
}

impl Layout {
    fn prefix(self) -> Option<&'static str> {
        match self {
            Layout::Object => Some(OBJECT_INDEX_PREFIX),
            Layout::Table => Some(TABLE_INDEX_PREFIX),
            Layout::Raw => None,
        }
    }

    /// Label positions only ever hold field names.
    fn is_label(self, position: usize, len: usize) -> bool {
        match self {
            Layout::Object => position + 1 < len,
            Layout::Table => position % 2 == 0,
            Layout::Raw => false,
        }
    }

    /// Splits a scanned key into the primary key it points at and the
    /// part the term is matched against.
    pub(crate) fn split<'k>(self, key: &'k [KeyPart]) -> Option<(Key, &'k [KeyPart])> {
        match self {
            Layout::Raw => match key.first().and_then(KeyPart::as_text) {
                Some(OBJECT_INDEX_PREFIX | TABLE_INDEX_PREFIX) => None,
                _ => Some((key.to_vec(), key)),
            },
            Layout::Object | Layout::Table => match key {
                [_, inner @ .., id @ KeyPart::Text(_)] => Some((vec![id.clone()], inner)),
                _ => None,
            },
        }
    }
}

impl From<IndexType> for Layout {
    fn from(index_type: IndexType) -> Self {
        match index_type {
            IndexType::Object => Layout::Object,
            IndexType::Table => Layout::Table,
        }
    }
}

/// One term of a query and the range that holds its candidates.
#[derive(Debug, Clone)]
pub(crate) struct ProbeTerm {
    pub slots: Vec<Slot>,
    pub range: KeyRange,
    /// First slot that does not pin a single key part.
    pub first_open: Option<usize>,
}

impl ProbeTerm {
    pub(crate) fn new(layout: Layout, slots: Vec<Slot>, cname: Option<&str>) -> Self {
        let range = term_range(layout, &slots, cname);
        let first_open = slots.iter().position(|slot| !slot.is_literal());
        Self {
            slots,
            range,
            first_open,
        }
    }
}

/// Range covering every key a term can match.
///
/// Literal slots pin their position. Open label positions span all
/// strings and other open positions span every kind. Index scans of a
/// known collection end on that collection's id range.
pub(crate) fn term_range(layout: Layout, slots: &[Slot], cname: Option<&str>) -> KeyRange {
    let mut start = Vec::with_capacity(slots.len() + 2);
    let mut end = Vec::with_capacity(slots.len() + 2);
    if let Some(prefix) = layout.prefix() {
        start.push(BoundPart::Part(KeyPart::from(prefix)));
        end.push(BoundPart::Part(KeyPart::from(prefix)));
    }
    for (i, slot) in slots.iter().enumerate() {
        match slot.bound_part() {
            Some(part) => {
                start.push(BoundPart::Part(part.clone()));
                end.push(BoundPart::Part(part));
            }
            None if layout.is_label(i, slots.len()) => {
                start.push(BoundPart::Min(KeyKind::Text));
                end.push(BoundPart::Max(KeyKind::Text));
            }
            None => {
                start.push(BoundPart::min_any());
                end.push(BoundPart::max_any());
            }
        }
    }
    match cname {
        Some(cname) if layout != Layout::Raw => {
            start.push(BoundPart::Part(KeyPart::Text(id_range_start(cname))));
            end.push(BoundPart::Part(KeyPart::Text(id_range_end(cname))));
        }
        _ => end.push(BoundPart::max_any()),
    }
    KeyRange::new(start, end)
}

/// The primary records of one collection, or all of them.
fn primary_range(cname: Option<&str>) -> KeyRange {
    match cname {
        Some(cname) => KeyRange::new(
            vec![BoundPart::Part(KeyPart::Text(id_range_start(cname)))],
            vec![BoundPart::Part(KeyPart::Text(id_range_end(cname)))],
        ),
        None => KeyRange::all(),
    }
}

/// Where candidates come from.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    /// Known keys, fetched directly.
    Direct(Vec<Key>),
    /// A scan of primary records.
    Primary(KeyRange),
    /// One scan per probe term.
    Terms(Vec<ProbeTerm>),
}

#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub source: Source,
    pub layout: Layout,
    pub term_count: usize,
    pub cname: Option<String>,
    pub id_filter: Option<String>,
}

impl Plan {
    pub(crate) fn build(
        registry: &Registry,
        config: &Config,
        query: &Query,
        options: &FindOptions,
    ) -> CoreResult<Self> {
        match query {
            Query::All => Ok(Self {
                source: Source::Primary(primary_range(options.cname.as_deref())),
                layout: Layout::Object,
                term_count: 0,
                cname: options.cname.clone(),
                id_filter: None,
            }),
            Query::Key(slots) => Self::for_key(slots),
            Query::Pattern(pattern) => {
                let mut cname = options
                    .cname
                    .clone()
                    .or_else(|| pattern.class().map(str::to_string));
                let primary_key = registry.primary_key(cname.as_deref(), &config.id_property);
                let id = match pattern.get(primary_key) {
                    Some(PatternNode::Literal(value)) => value.as_text().map(str::to_string),
                    _ => None,
                };
                if cname.is_none() {
                    cname = id.as_deref().and_then(cname_of);
                }
                let node = pattern_node(pattern, primary_key);

                let (layout, tuples) = match &options.index_name {
                    Some(index_name) => {
                        let owner = cname
                            .as_deref()
                            .ok_or_else(|| CoreError::range(format!("index {index_name} needs a collection")))?;
                        let index = registry
                            .index(owner, index_name)
                            .ok_or_else(|| CoreError::range(format!("no index {index_name} on {owner}")))?;
                        let tuples = match index.index_type {
                            IndexType::Object => object_tuples(&node, &index.keys),
                            IndexType::Table => vec![table_tuple(&node, &index.keys)],
                        };
                        (Layout::from(index.index_type), tuples)
                    }
                    // Every leaf becomes a term; a field no index covers finds nothing.
                    None => (Layout::Object, object_tuples(&node, &[])),
                };

                let source = if !tuples.is_empty() {
                    Source::Terms(
                        tuples
                            .into_iter()
                            .map(|slots| ProbeTerm::new(layout, slots, cname.as_deref()))
                            .collect(),
                    )
                } else if let Some(id) = &id {
                    Source::Direct(vec![vec![KeyPart::Text(id.clone())]])
                } else {
                    Source::Primary(primary_range(cname.as_deref()))
                };
                let term_count = match &source {
                    Source::Terms(terms) => terms.len(),
                    _ => 0,
                };
                Ok(Self {
                    source,
                    layout,
                    term_count,
                    cname,
                    id_filter: id,
                })
            }
        }
    }

    fn for_key(slots: &[Slot]) -> CoreResult<Self> {
        if slots.is_empty() {
            return Err(CoreError::invalid_argument("key query is empty"));
        }
        let pinned: Option<Key> = slots.iter().map(Slot::bound_part).collect();
        let source = match pinned {
            Some(key) => Source::Direct(vec![key]),
            None => Source::Terms(vec![ProbeTerm::new(Layout::Raw, slots.to_vec(), None)]),
        };
        Ok(Self {
            source,
            layout: Layout::Raw,
            term_count: 1,
            cname: None,
            id_filter: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use crate::pattern::Pattern;
    use kvdoc_codec::RegexLiteral;

    const ID: &str = "Book@1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed";

    fn index_key(parts: &[KeyPart]) -> Key {
        let mut key = vec![KeyPart::from(OBJECT_INDEX_PREFIX)];
        key.extend_from_slice(parts);
        key.push(KeyPart::from(ID));
        key
    }

    #[test]
    fn literal_term_pins_range() {
        let range = term_range(
            Layout::Object,
            &[Slot::label("title"), Slot::from("T")],
            Some("Book"),
        );
        assert!(range.contains(&index_key(&[KeyPart::from("title"), KeyPart::from("T")])));
        assert!(!range.contains(&index_key(&[KeyPart::from("title"), KeyPart::from("U")])));
        assert!(!range.contains(&index_key(&[KeyPart::from("author"), KeyPart::from("T")])));
    }

    #[test]
    fn open_slots_span_kinds() {
        let range = term_range(
            Layout::Object,
            &[Slot::Regex(RegexLiteral::new("^ti", "").unwrap()), Slot::Test(ops::gt(1.0))],
            Some("Book"),
        );
        assert!(range.contains(&index_key(&[KeyPart::from("title"), KeyPart::from(5)])));
        assert!(range.contains(&index_key(&[KeyPart::from("pages"), KeyPart::from(true)])));

        let other = vec![
            KeyPart::from(OBJECT_INDEX_PREFIX),
            KeyPart::from("title"),
            KeyPart::from(5),
            KeyPart::from("Person@1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed"),
        ];
        assert!(!range.contains(&other));
    }

    #[test]
    fn raw_range_has_no_prefix() {
        let range = term_range(Layout::Raw, &[Slot::from("users"), Slot::Any], None);
        assert!(range.contains(&[KeyPart::from("users"), KeyPart::from(1)]));
        assert!(!range.contains(&[KeyPart::from("posts"), KeyPart::from(1)]));
    }

    #[test]
    fn split_index_keys() {
        let key = index_key(&[KeyPart::from("title"), KeyPart::from("T")]);
        let (id, inner) = Layout::Object.split(&key).unwrap();
        assert_eq!(id, vec![KeyPart::from(ID)]);
        assert_eq!(inner.len(), 2);
        assert!(Layout::Object.split(&[KeyPart::from(1)]).is_none());
    }

    #[test]
    fn id_only_pattern_is_direct() {
        let registry = Registry::new();
        let query = Query::Pattern(Pattern::new().field("#", ID));
        let plan = Plan::build(&registry, &Config::default(), &query, &FindOptions::new()).unwrap();
        assert!(matches!(plan.source, Source::Direct(_)));
        assert_eq!(plan.cname.as_deref(), Some("Book"));
        assert_eq!(plan.id_filter.as_deref(), Some(ID));
    }

    #[test]
    fn unknown_index_is_a_range_error() {
        let registry = Registry::new();
        let query = Query::Pattern(Pattern::new().field("title", "T"));
        let options = FindOptions::new().cname("Book").index_name("missing");
        let err = Plan::build(&registry, &Config::default(), &query, &options).unwrap_err();
        assert!(matches!(err, CoreError::Range { .. }));
    }

    #[test]
    fn empty_key_query_is_rejected() {
        let registry = Registry::new();
        let err = Plan::build(&registry, &Config::default(), &Query::Key(vec![]), &FindOptions::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }
}
