//! Typed collection implementation.

use std::marker::PhantomData;

use kvdoc_codec::Value;

use crate::collection::codec::EntityCodec;
use crate::database::{Database, DeleteOptions, PutOptions};
use crate::entity::cname_of;
use crate::error::CoreResult;
use crate::pattern::Pattern;
use crate::query::{FindOptions, Query};

/// A typed collection of entities.
///
/// `Collection<T>` provides type-safe access to the entities of
/// `T::CNAME`, converting through [`EntityCodec`]. Every call goes through
/// the database, so index maintenance and expiry apply as usual.
///
/// # Example
///
/// ```rust,ignore
/// let books = db.collection::<Book>();
///
/// let id = books.put(&book)?;
/// let found = books.get(&id)?;
///
/// for (id, book) in books.find(Pattern::new().field("author", "Laloux"))? {
///     println!("{id}: {}", book.title);
/// }
/// ```
pub struct Collection<'db, T: EntityCodec> {
    db: &'db Database,
    _marker: PhantomData<T>,
}

impl<'db, T: EntityCodec> Collection<'db, T> {
    /// Creates a typed view over `db`.
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &'static str {
        T::CNAME
    }

    /// Stores an entity. Returns its id.
    pub fn put(&self, entity: &T) -> CoreResult<String> {
        self.db.put(entity.encode()?, PutOptions::new().cname(T::CNAME))
    }

    /// Gets an entity by id.
    ///
    /// Returns `None` if the entity doesn't exist, has expired, or belongs
    /// to another collection.
    pub fn get(&self, id: &str) -> CoreResult<Option<T>> {
        if cname_of(id).as_deref() != Some(T::CNAME) {
            return Ok(None);
        }
        match self.db.get(&Value::from(id))? {
            Some(entry) => Ok(Some(T::decode(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Finds the entities matching `pattern`, with their ids.
    pub fn find(&self, pattern: Pattern) -> CoreResult<Vec<(String, T)>> {
        self.decode_all(self.db.find(pattern, FindOptions::new().cname(T::CNAME))?)
    }

    /// Returns every entity of the collection.
    pub fn all(&self) -> CoreResult<Vec<(String, T)>> {
        self.decode_all(self.db.find(Query::All, FindOptions::new().cname(T::CNAME))?)
    }

    /// Deletes an entity. Returns `true` if it existed.
    pub fn delete(&self, id: &str) -> CoreResult<bool> {
        let deleted = self
            .db
            .delete(id, DeleteOptions::new().cname(T::CNAME))?;
        Ok(deleted > 0)
    }

    /// Counts the live entities of the collection.
    pub fn count(&self) -> CoreResult<usize> {
        self.db
            .find(Query::All, FindOptions::new().cname(T::CNAME))?
            .try_fold(0, |count, hit| hit.map(|_| count + 1))
    }

    fn decode_all(&self, hits: impl Iterator<Item = CoreResult<crate::query::Hit>>) -> CoreResult<Vec<(String, T)>> {
        hits.map(|hit| {
            let hit = hit?;
            let id = hit.key.as_text().unwrap_or_default().to_string();
            Ok((id, T::decode(&hit.value)?))
        })
        .collect()
    }
}
