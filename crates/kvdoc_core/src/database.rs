//! Database facade.

use std::collections::BTreeSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use kvdoc_codec::{from_key, to_key, Decode, Encode, Object, Value};
use kvdoc_storage::{AtomicOperation, Key, KeyPart, KeyRange, MemoryStore, OrderedStore, Versionstamp};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind, SubscriptionFilter};
use crate::collection::{Collection, EntityCodec};
use crate::config::Config;
use crate::entity::{cname_of, is_id, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::index::maintainer::IndexMaintainer;
use crate::index::{IndexDefinition, IndexSpec, IndexType, Registration, Registry, Schema};
use crate::metadata::{self, now_ms, Metadata};
use crate::pattern::{Pattern, Slot};
use crate::query::{self, Cursor, FindOptions, Hit, Query};

/// A stored value as returned by [`Database::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The key, read back as a value.
    pub key: Value,
    /// The stored value. Entities carry their collection as object class.
    pub value: Value,
    /// Metadata envelope.
    pub metadata: Metadata,
    /// Store version of the record.
    pub versionstamp: Versionstamp,
}

/// Options for [`Database::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Collection; otherwise the object class or the id decides.
    pub cname: Option<String>,
    /// Metadata to store with the entity.
    pub metadata: Option<Metadata>,
    /// Restricts maintenance to one index shape.
    pub index_type: Option<IndexType>,
    /// Ad hoc index keys, used instead of the declared indexes.
    pub index_keys: Option<Vec<String>>,
    /// Derive an object index from the entity's own fields when the
    /// collection declares none.
    pub auto_index: bool,
}

impl PutOptions {
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

    /// Sets the metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Restricts maintenance to one index shape.
    #[must_use]
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = Some(index_type);
        self
    }

    /// Indexes the entity by these keys only.
    pub fn index_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Enables automatic indexing.
    #[must_use]
    pub fn auto_index(mut self) -> Self {
        self.auto_index = true;
        self
    }
}

/// Options for [`Database::patch`].
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Collection of the patched entities.
    pub cname: Option<String>,
    /// Patch every entity matching this pattern.
    pub pattern: Option<Pattern>,
    /// Metadata merged over the stored metadata.
    pub metadata: Option<Metadata>,
}

impl PatchOptions {
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

    /// Patches the matches of `pattern`.
    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// What [`Database::delete`] removes.
#[derive(Debug, Clone)]
pub enum Target {
    /// A raw key or an entity id.
    Key(Value),
    /// An entity, located by its primary-key field.
    Entity(Value),
    /// Every entity matching a pattern.
    Pattern(Pattern),
    /// Every raw key matching a tuple.
    KeyPattern(Vec<Slot>),
}

impl From<&str> for Target {
    fn from(key: &str) -> Self {
        Target::Key(Value::from(key))
    }
}

impl From<String> for Target {
    fn from(key: String) -> Self {
        Target::Key(Value::from(key))
    }
}

impl From<Value> for Target {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) => Target::Entity(value),
            other => Target::Key(other),
        }
    }
}

impl From<Pattern> for Target {
    fn from(pattern: Pattern) -> Self {
        Target::Pattern(pattern)
    }
}

/// Options for [`Database::delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Collection of the deleted entities.
    pub cname: Option<String>,
    /// Remove only the index entries and keep the primary records.
    pub index_only: bool,
}

impl DeleteOptions {
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

    /// Repairs indexes without deleting data.
    #[must_use]
    pub fn index_only(mut self) -> Self {
        self.index_only = true;
        self
    }
}

/// A completed entity write.
struct Written {
    id: String,
    cname: Option<String>,
    value: Value,
    metadata: Metadata,
}

/// The main database handle.
///
/// `Database` layers documents, secondary indexes and pattern queries
/// over an [`OrderedStore`]. It provides:
/// - Raw key access with TTL (`set`, `get`)
/// - Entity writes with index maintenance (`put`, `patch`, `delete`)
/// - Pattern queries over the indexes (`find`)
/// - Schema and index management
/// - Change subscriptions
///
/// The handle owns its collection registry; nothing is shared between
/// handles opened on the same store.
///
/// # Example
///
/// ```rust
/// use kvdoc_core::{Database, FindOptions, IndexSpec, Pattern, PutOptions, Value};
///
/// let db = Database::open_in_memory();
/// db.create_index(IndexSpec::object("Book", ["title", "author"])).unwrap();
///
/// let id = db
///     .put(
///         Value::object([("title", "Reinventing Organizations"), ("author", "Laloux")]),
///         PutOptions::new().cname("Book"),
///     )
///     .unwrap();
///
/// let hits = db
///     .find_all(Pattern::new().field("author", "Laloux"), FindOptions::new().cname("Book"))
///     .unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].key, Value::from(id));
/// ```
pub struct Database {
    /// Backing store.
    store: Arc<dyn OrderedStore>,
    /// Configuration.
    config: Config,
    /// Collections and their indexes.
    registry: RwLock<Registry>,
    /// Change subscriptions.
    feed: ChangeFeed,
}

impl Database {
    /// Opens a database over `store` with the default configuration.
    pub fn open(store: Arc<dyn OrderedStore>) -> Self {
        Self::open_with_config(store, Config::default())
    }

    /// Opens a database over `store`.
    ///
    /// The registry starts empty; declare collections with
    /// [`create_schema`](Self::create_schema) or
    /// [`create_index`](Self::create_index).
    pub fn open_with_config(store: Arc<dyn OrderedStore>, config: Config) -> Self {
        debug!(max_transaction_size = config.max_transaction_size, "database opened");
        Self {
            store,
            config,
            registry: RwLock::new(Registry::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Opens a database over a fresh [`MemoryStore`].
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::open(Arc::new(MemoryStore::new()))
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &dyn OrderedStore {
        self.store.as_ref()
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read()
    }

    /// A copy of the schema of `cname`.
    #[must_use]
    pub fn schema(&self, cname: &str) -> Option<Schema> {
        self.registry.read().schema(cname).cloned()
    }

    // =========================================================================
    // Schemas and indexes
    // =========================================================================

    /// Registers a collection and backfills its declared indexes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if the collection is known.
    pub fn create_schema(&self, schema: Schema) -> CoreResult<()> {
        let cname = schema.cname.clone();
        let indexes = schema.indexes.clone();
        self.registry.write().create_schema(schema)?;
        info!(cname = %cname, indexes = indexes.len(), "schema created");
        for index in &indexes {
            self.backfill(&cname, index)?;
        }
        Ok(())
    }

    /// Registers a collection declared as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the document is not a
    /// schema, and the errors of [`create_schema`](Self::create_schema).
    pub fn create_schema_from_json(&self, json: &str) -> CoreResult<()> {
        let schema: Schema = serde_json::from_str(json)
            .map_err(|e| CoreError::invalid_argument(format!("schema: {e}")))?;
        self.create_schema(schema)
    }

    /// Registers an index and backfills it from the stored entities.
    ///
    /// Creating an identical index again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] without a collection or keys,
    /// and [`CoreError::AlreadyExists`] if a different index has the name.
    pub fn create_index(&self, spec: IndexSpec) -> CoreResult<Registration> {
        let cname = spec
            .cname
            .clone()
            .ok_or_else(|| CoreError::invalid_argument("index needs a collection"))?;
        self.register_index(&cname, spec.definition())
    }

    fn register_index(&self, cname: &str, index: IndexDefinition) -> CoreResult<Registration> {
        let registration = self.registry.write().add_index(cname, index.clone())?;
        if registration == Registration::Created {
            info!(cname = %cname, index = %index.name, "index created");
            self.backfill(cname, &index)?;
        }
        Ok(registration)
    }

    fn backfill(&self, cname: &str, index: &IndexDefinition) -> CoreResult<()> {
        let primary_key = self.primary_key(Some(cname));
        let maintainer = self.maintainer();
        let mut entries = 0;
        let hits = self.find_all(Query::All, FindOptions::new().cname(cname))?;
        for hit in &hits {
            let Some(id) = hit.key.as_text() else {
                continue;
            };
            let keys = IndexMaintainer::entry_keys(index, &hit.value, id, &primary_key)?;
            if index.unique {
                maintainer.check_unique(index, &keys, id)?;
            }
            entries += maintainer.add(&keys)?;
        }
        info!(cname = %cname, index = %index.name, entities = hits.len(), entries, "index backfilled");
        Ok(())
    }

    // =========================================================================
    // Raw keys
    // =========================================================================

    /// Writes `value` under a raw key without index maintenance.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `key` is not a scalar or array of scalars.
    pub fn set(&self, key: &Value, value: Value) -> CoreResult<Versionstamp> {
        self.set_with_metadata(key, value, Metadata::new())
    }

    /// Writes `value` with a metadata envelope.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `key` is not a scalar or array of scalars.
    pub fn set_with_metadata(&self, key: &Value, value: Value, metadata: Metadata) -> CoreResult<Versionstamp> {
        let parts = to_key(key)?;
        let version = self.write_record(&parts, &value, &metadata)?;
        self.feed.emit(
            ChangeEvent::new(ChangeKind::Set, key.clone(), value)
                .with_cname(primary_text(&parts).and_then(cname_of).as_deref())
                .with_metadata(&metadata),
        );
        Ok(version)
    }

    /// Reads a key or an entity id.
    ///
    /// Expired values are deleted and reported as absent. Entities come
    /// back with their collection as object class.
    ///
    /// # Errors
    ///
    /// Returns a codec error for unsupported keys and store errors.
    pub fn get(&self, key: &Value) -> CoreResult<Option<Entry>> {
        self.read_live(&to_key(key)?)
    }

    pub(crate) fn read_live(&self, key: &Key) -> CoreResult<Option<Entry>> {
        let Some((value, metadata, versionstamp)) = self.read_record(key)? else {
            return Ok(None);
        };
        if metadata.is_expired(now_ms()) {
            if let Some(id) = primary_text(key).filter(|id| is_id(id)) {
                self.purge_indexes(id, &value)?;
            }
            self.store.delete(key)?;
            debug!(key = ?key, "expired value removed");
            return Ok(None);
        }
        let mut value = value;
        if let (Some(cname), Value::Object(object)) = (primary_text(key).and_then(cname_of), &mut value) {
            object.set_class(Some(cname));
        }
        Ok(Some(Entry {
            key: from_key(key),
            value,
            metadata,
            versionstamp,
        }))
    }

    /// Removes the stale index entries that led to a missing entity.
    pub(crate) fn collect_dangling(&self, key: &Key, stale: &[Key]) -> CoreResult<()> {
        warn!(key = ?key, entries = stale.len(), "removing dangling index entries");
        self.maintainer().remove(stale)?;
        self.store.delete(key)?;
        Ok(())
    }

    fn read_record(&self, key: &[KeyPart]) -> CoreResult<Option<(Value, Metadata, Versionstamp)>> {
        let Some(entry) = self.store.get(key)? else {
            return Ok(None);
        };
        let (value, metadata) = metadata::unwrap(Value::decode(&entry.value)?);
        Ok(Some((value, metadata, entry.versionstamp)))
    }

    fn write_record(&self, key: &[KeyPart], value: &Value, metadata: &Metadata) -> CoreResult<Versionstamp> {
        let bytes = metadata::wrap(value.clone(), metadata).encode()?;
        Ok(self.store.set(key, bytes)?)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Stores an object as an entity and maintains its indexes.
    ///
    /// An id is assigned when the primary-key field is missing. The field
    /// named by `metadata_property` is moved into the metadata envelope.
    /// Returns the id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for non-objects,
    /// [`CoreError::UniqueViolation`] when a unique index already holds one
    /// of the entity's tuples, and codec or store errors.
    pub fn put(&self, value: Value, options: PutOptions) -> CoreResult<String> {
        let written = self.write_entity(value, &options)?;
        self.emit_entity(ChangeKind::Put, &written);
        Ok(written.id)
    }

    /// Merges changes into stored entities.
    ///
    /// Without a pattern, `value` must be an object carrying an id; its
    /// fields are merged over the stored entity. With a pattern, an object
    /// `value` is merged into every match and any other value replaces
    /// each match. Returns the keys of the patched records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a scalar or an id-less
    /// object without a pattern.
    pub fn patch(&self, value: Value, options: PatchOptions) -> CoreResult<Vec<Value>> {
        match &options.pattern {
            Some(pattern) => {
                let query = Query::Pattern(pattern.clone());
                self.patch_matches(query, &options, |old| match (&value, old) {
                    (Value::Object(update), Value::Object(current)) => {
                        let mut merged = current.clone();
                        merged.assign(update);
                        Some(Value::Object(merged))
                    }
                    _ => Some(value.clone()),
                })
            }
            None => {
                let Value::Object(update) = &value else {
                    return Err(CoreError::invalid_argument(format!(
                        "patch of a {} needs a pattern",
                        value.type_name()
                    )));
                };
                let cname = options.cname.clone().or_else(|| update.class().map(str::to_string));
                let primary_key = self.primary_key(cname.as_deref());
                let Some(id) = update.get(&primary_key).and_then(Value::as_text) else {
                    return Err(CoreError::invalid_argument(format!(
                        "patch needs a pattern or a {primary_key} field"
                    )));
                };
                let key = vec![KeyPart::from(id)];
                let (merged, mut metadata) = match self.read_live(&key)? {
                    Some(Entry {
                        value: Value::Object(mut current),
                        metadata,
                        ..
                    }) => {
                        current.assign(update);
                        (current, metadata)
                    }
                    Some(entry) => (update.clone(), entry.metadata),
                    None => (update.clone(), Metadata::new()),
                };
                if let Some(extra) = &options.metadata {
                    metadata.merge(extra);
                }
                let written = self.write_entity(Value::Object(merged), &put_options(cname, metadata))?;
                self.emit_entity(ChangeKind::Patch, &written);
                Ok(vec![Value::from(written.id)])
            }
        }
    }

    /// Replaces every match of `query` with `update(current)`.
    ///
    /// Object results are stored as entities with index maintenance;
    /// other results are written as is. Matches for which `update`
    /// returns `None` are left alone.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`find`](Self::find) and [`put`](Self::put).
    pub fn patch_with(
        &self,
        query: impl Into<Query>,
        options: PatchOptions,
        update: impl Fn(&Value) -> Option<Value>,
    ) -> CoreResult<Vec<Value>> {
        self.patch_matches(query.into(), &options, update)
    }

    fn patch_matches(
        &self,
        query: Query,
        options: &PatchOptions,
        update: impl Fn(&Value) -> Option<Value>,
    ) -> CoreResult<Vec<Value>> {
        let mut find = FindOptions::new();
        find.cname = options.cname.clone();
        let hits = self.find_all(query, find)?;
        let mut patched = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(next) = update(&hit.value) else {
                continue;
            };
            let mut metadata = hit.metadata.clone();
            if let Some(extra) = &options.metadata {
                metadata.merge(extra);
            }
            let parts = to_key(&hit.key)?;
            let id = primary_text(&parts).filter(|id| is_id(id)).map(str::to_string);
            let cname = options.cname.clone().or_else(|| id.as_deref().and_then(cname_of));
            match (id, next) {
                (Some(id), Value::Object(mut object)) => {
                    let primary_key = self.primary_key(cname.as_deref());
                    object.insert(primary_key, id.as_str());
                    let written = self.write_entity(Value::Object(object), &put_options(cname, metadata))?;
                    self.emit_entity(ChangeKind::Patch, &written);
                }
                (id, next) => {
                    if let Some(id) = &id {
                        self.purge_indexes(id, &hit.value)?;
                    }
                    self.write_record(&parts, &next, &metadata)?;
                    self.feed.emit(
                        ChangeEvent::new(ChangeKind::Patch, hit.key.clone(), next)
                            .with_cname(cname.as_deref())
                            .with_metadata(&metadata),
                    );
                }
            }
            patched.push(hit.key);
        }
        Ok(patched)
    }

    /// Deletes a key, an entity, or every match of a pattern.
    ///
    /// Index entries are always removed before the primary record.
    /// Returns the number of records deleted (or repaired, with
    /// `index_only`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an entity without an id.
    pub fn delete(&self, target: impl Into<Target>, options: DeleteOptions) -> CoreResult<usize> {
        match target.into() {
            Target::Key(key) => {
                let parts = to_key(&key)?;
                Ok(usize::from(self.delete_key(&parts, None, options.index_only)?))
            }
            Target::Entity(value) => {
                let cname = options
                    .cname
                    .clone()
                    .or_else(|| value.as_object().and_then(Object::class).map(str::to_string));
                let primary_key = self.primary_key(cname.as_deref());
                let Some(id) = value.get(&primary_key).and_then(Value::as_text) else {
                    return Err(CoreError::invalid_argument(format!(
                        "delete of an object needs a {primary_key} field or a pattern"
                    )));
                };
                let parts = vec![KeyPart::from(id)];
                Ok(usize::from(self.delete_key(&parts, Some(&value), options.index_only)?))
            }
            Target::Pattern(pattern) => {
                let mut find = FindOptions::new();
                find.cname = options.cname.clone();
                let hits = self.find_all(pattern, find)?;
                self.delete_hits(&hits, options.index_only)
            }
            Target::KeyPattern(slots) => {
                let hits = self.find_all(Query::Key(slots), FindOptions::new())?;
                self.delete_hits(&hits, options.index_only)
            }
        }
    }

    fn delete_hits(&self, hits: &[Hit], index_only: bool) -> CoreResult<usize> {
        let mut deleted = 0;
        for hit in hits {
            let parts = to_key(&hit.key)?;
            if self.delete_key(&parts, Some(&hit.value), index_only)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Deletes one record. Ids also lose their index entries, computed from
    /// the stored value or, when nothing is stored, from `known`.
    fn delete_key(&self, key: &Key, known: Option<&Value>, index_only: bool) -> CoreResult<bool> {
        let stored = self.read_record(key)?;
        if let Some(id) = primary_text(key).filter(|id| is_id(id)) {
            let source = stored.as_ref().map(|(value, _, _)| value).or(known);
            if let Some(value) = source {
                self.purge_indexes(id, value)?;
            }
        }
        if index_only {
            return Ok(stored.is_some());
        }
        let Some((value, _, _)) = stored else {
            return Ok(false);
        };
        self.store.delete(key)?;
        let key_value = from_key(key);
        self.feed.emit(
            ChangeEvent::new(ChangeKind::Delete, key_value, value)
                .with_cname(primary_text(key).and_then(cname_of).as_deref()),
        );
        Ok(true)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Finds values matching `query`.
    ///
    /// Candidates are planned eagerly; values are fetched lazily as the
    /// cursor advances.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Range`] when `index_name` cannot be resolved,
    /// and store errors raised while scanning.
    pub fn find(&self, query: impl Into<Query>, options: FindOptions) -> CoreResult<Cursor<'_>> {
        query::execute(self, &query.into(), options)
    }

    /// Collects every result of [`find`](Self::find).
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the query or the cursor.
    pub fn find_all(&self, query: impl Into<Query>, options: FindOptions) -> CoreResult<Vec<Hit>> {
        self.find(query, options)?.collect()
    }

    /// Deletes every key in the store. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn clear(&self) -> CoreResult<usize> {
        let keys = self
            .store
            .list(&KeyRange::all(), None)
            .map(|entry| entry.map(|entry| entry.key))
            .collect::<Result<Vec<_>, _>>()?;
        for batch in keys.chunks(self.store.max_mutations().max(1)) {
            let mut op = AtomicOperation::new(self.store.as_ref());
            for key in batch {
                op.delete(key.clone());
            }
            op.commit()?;
        }
        info!(keys = keys.len(), "store cleared");
        Ok(keys.len())
    }

    // =========================================================================
    // Changes and typed access
    // =========================================================================

    /// Subscribes to completed writes.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Receiver<ChangeEvent> {
        self.feed.subscribe(filter)
    }

    /// The change feed, for polling history.
    pub fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    /// A typed view over the collection of `T`.
    pub fn collection<T: EntityCodec>(&self) -> Collection<'_, T> {
        Collection::new(self)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn maintainer(&self) -> IndexMaintainer<'_> {
        IndexMaintainer::new(self.store.as_ref(), self.config.max_transaction_size)
    }

    fn primary_key(&self, cname: Option<&str>) -> String {
        self.registry
            .read()
            .primary_key(cname, &self.config.id_property)
            .to_string()
    }

    /// Indexes maintained for a write into `cname`.
    fn write_indexes(&self, cname: Option<&str>, object: &Object, options: &PutOptions) -> CoreResult<Vec<IndexDefinition>> {
        if let Some(keys) = &options.index_keys {
            return Ok(vec![IndexDefinition {
                name: "dynamic".to_string(),
                index_type: options.index_type.unwrap_or(IndexType::Object),
                keys: keys.clone(),
                unique: false,
            }]);
        }
        let Some(cname) = cname else {
            return Ok(Vec::new());
        };
        if options.auto_index && self.registry.read().indexes(cname, Some(IndexType::Object)).is_empty() {
            let primary_key = self.primary_key(Some(cname));
            let keys: Vec<String> = object
                .keys()
                .filter(|key| *key != primary_key)
                .map(str::to_string)
                .collect();
            if !keys.is_empty() {
                let auto = IndexDefinition {
                    name: "auto".to_string(),
                    index_type: IndexType::Object,
                    keys,
                    unique: false,
                };
                self.register_index(cname, auto)?;
            }
        }
        Ok(self.registry.read().indexes(cname, options.index_type))
    }

    fn write_entity(&self, value: Value, options: &PutOptions) -> CoreResult<Written> {
        let Value::Object(mut object) = value else {
            return Err(CoreError::invalid_argument(format!(
                "put expects an object, got {}",
                value.type_name()
            )));
        };
        let cname = options.cname.clone().or_else(|| object.class().map(str::to_string));
        let primary_key = self.primary_key(cname.as_deref());
        let id = match object.get(&primary_key) {
            Some(Value::Text(id)) => id.clone(),
            Some(other) => {
                return Err(CoreError::type_mismatch(format!(
                    "{primary_key} must be a string, got {}",
                    other.type_name()
                )))
            }
            None => {
                let id = EntityId::new(cname.as_deref()).to_string();
                object.insert(primary_key.clone(), id.as_str());
                id
            }
        };
        let cname = cname.or_else(|| cname_of(&id));

        let mut metadata = options.metadata.clone().unwrap_or_default();
        if let Some(field) = object.remove(&self.config.metadata_property) {
            metadata.merge(&Metadata::from_field(&field)?);
        }
        if metadata.created.is_none() {
            metadata.created = Some(now_ms());
        }
        object.set_class(None);

        let indexes = self.write_indexes(cname.as_deref(), &object, options)?;
        // Old entries come out of every registered index, even ones this write skips.
        let registered = cname
            .as_deref()
            .map(|cname| self.registry.read().indexes(cname, None))
            .unwrap_or_default();
        let value = Value::Object(object);
        let key = vec![KeyPart::from(id.as_str())];

        if !indexes.is_empty() || !registered.is_empty() {
            let maintainer = self.maintainer();
            let previous = self.read_record(&key)?;
            let mut fresh = BTreeSet::new();
            for index in &indexes {
                let keys = IndexMaintainer::entry_keys(index, &value, &id, &primary_key)?;
                if index.unique {
                    maintainer.check_unique(index, &keys, &id)?;
                }
                fresh.extend(keys);
            }
            let mut stale = BTreeSet::new();
            if let Some((old, _, _)) = &previous {
                for index in registered.iter().chain(&indexes) {
                    stale.extend(IndexMaintainer::entry_keys(index, old, &id, &primary_key)?);
                }
            }
            // A narrowed earlier write may have skipped entries, so every fresh key is rewritten.
            let removed = maintainer.remove(stale.difference(&fresh))?;
            let added = maintainer.add(&fresh)?;
            debug!(id = %id, removed, added, "index entries updated");
        }

        self.write_record(&key, &value, &metadata)?;
        Ok(Written {
            id,
            cname,
            value,
            metadata,
        })
    }

    /// Removes the index entries `value` produces for `id`.
    fn purge_indexes(&self, id: &str, value: &Value) -> CoreResult<usize> {
        let Some(cname) = cname_of(id) else {
            return Ok(0);
        };
        let indexes = self.registry.read().indexes(&cname, None);
        if indexes.is_empty() {
            return Ok(0);
        }
        let primary_key = self.primary_key(Some(&cname));
        let mut keys = BTreeSet::new();
        for index in &indexes {
            keys.extend(IndexMaintainer::entry_keys(index, value, id, &primary_key)?);
        }
        self.maintainer().remove(&keys)
    }

    fn emit_entity(&self, kind: ChangeKind, written: &Written) {
        self.feed.emit(
            ChangeEvent::new(kind, Value::from(written.id.as_str()), written.value.clone())
                .with_cname(written.cname.as_deref())
                .with_metadata(&written.metadata),
        );
    }
}

fn put_options(cname: Option<String>, metadata: Metadata) -> PutOptions {
    PutOptions {
        cname,
        metadata: Some(metadata),
        ..PutOptions::default()
    }
}

fn primary_text(key: &[KeyPart]) -> Option<&str> {
    match key {
        [KeyPart::Text(text)] => Some(text),
        _ => None,
    }
}
