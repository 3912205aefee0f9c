//! Catalog of collections and their indexes.
//!
//! The registry is owned by a [`crate::Database`] handle. It starts empty
//! when the handle is opened and changes only through `create_schema`
//! and `create_index`; schemas are never removed or versioned.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::index::definition::{IndexDefinition, IndexType, Schema};

/// The collection catalog.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    schemas: HashMap<String, Schema>,
}

/// Outcome of registering an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The index is new and must be backfilled.
    Created,
    /// An identical index was already registered.
    Unchanged,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if `cname` is already known,
    /// including collections created implicitly by `create_index`, and
    /// [`CoreError::InvalidArgument`] if one of its indexes has no keys.
    pub fn create_schema(&mut self, schema: Schema) -> CoreResult<()> {
        if schema.cname.is_empty() {
            return Err(CoreError::invalid_argument("schema cname is empty"));
        }
        if self.schemas.contains_key(&schema.cname) {
            return Err(CoreError::already_exists(format!("schema {}", schema.cname)));
        }
        for index in &schema.indexes {
            check_keys(index)?;
        }
        self.schemas.insert(schema.cname.clone(), schema);
        Ok(())
    }

    /// Registers an index under `cname`, creating the collection if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty key list and
    /// [`CoreError::AlreadyExists`] when a different index already uses the name.
    pub fn add_index(&mut self, cname: &str, index: IndexDefinition) -> CoreResult<Registration> {
        check_keys(&index)?;
        let schema = self
            .schemas
            .entry(cname.to_string())
            .or_insert_with(|| Schema::new(cname));
        match schema.index(&index.name) {
            Some(existing) if *existing == index => Ok(Registration::Unchanged),
            Some(_) => Err(CoreError::already_exists(format!(
                "index {} on {cname}",
                index.name
            ))),
            None => {
                schema.indexes.push(index);
                Ok(Registration::Created)
            }
        }
    }

    /// Looks up a collection.
    #[must_use]
    pub fn schema(&self, cname: &str) -> Option<&Schema> {
        self.schemas.get(cname)
    }

    /// Returns `true` if `cname` is registered.
    #[must_use]
    pub fn contains(&self, cname: &str) -> bool {
        self.schemas.contains_key(cname)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, cname: &str, name: &str) -> Option<&IndexDefinition> {
        self.schema(cname).and_then(|schema| schema.index(name))
    }

    /// Indexes of `cname`, optionally restricted to one shape.
    #[must_use]
    pub fn indexes(&self, cname: &str, index_type: Option<IndexType>) -> Vec<IndexDefinition> {
        self.schema(cname)
            .map(|schema| {
                schema
                    .indexes
                    .iter()
                    .filter(|index| index_type.map_or(true, |t| index.index_type == t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Primary-key field of `cname`, falling back to `default`.
    #[must_use]
    pub fn primary_key<'a>(&'a self, cname: Option<&str>, default: &'a str) -> &'a str {
        cname
            .and_then(|c| self.schema(c))
            .and_then(|schema| schema.primary_key.as_deref())
            .unwrap_or(default)
    }

    /// Registered collection names.
    pub fn cnames(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

fn check_keys(index: &IndexDefinition) -> CoreResult<()> {
    if index.keys.is_empty() {
        return Err(CoreError::invalid_argument(format!("index {} keys are empty", index.name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::definition::IndexSpec;

    #[test]
    fn duplicate_schema_fails() {
        let mut registry = Registry::new();
        registry.create_schema(Schema::new("Book")).unwrap();
        let err = registry.create_schema(Schema::new("Book")).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[test]
    fn add_index_creates_collection() {
        let mut registry = Registry::new();
        let index = IndexSpec::object("Book", ["title"]).definition();
        assert_eq!(registry.add_index("Book", index.clone()).unwrap(), Registration::Created);
        assert_eq!(registry.add_index("Book", index).unwrap(), Registration::Unchanged);
        assert!(registry.contains("Book"));
        assert!(registry.create_schema(Schema::new("Book")).is_err());
    }

    #[test]
    fn conflicting_index_name() {
        let mut registry = Registry::new();
        registry
            .add_index("Book", IndexSpec::object("Book", ["a"]).named("x").definition())
            .unwrap();
        let err = registry
            .add_index("Book", IndexSpec::table("Book", ["a"]).named("x").definition())
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[test]
    fn empty_keys_rejected() {
        let mut registry = Registry::new();
        let empty: [&str; 0] = [];
        let err = registry
            .add_index("Book", IndexSpec::object("Book", empty).definition())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn schema_indexes_need_keys() {
        let mut registry = Registry::new();
        let empty: [&str; 0] = [];
        let mut schema = Schema::new("Book");
        schema.indexes.push(IndexSpec::object("Book", ["title"]).definition());
        schema.indexes.push(IndexSpec::object("Book", empty).named("bare").definition());
        let err = registry.create_schema(schema).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
        assert!(!registry.contains("Book"));
    }

    #[test]
    fn indexes_filter_by_type() {
        let mut registry = Registry::new();
        registry
            .add_index("Book", IndexSpec::object("Book", ["title"]).definition())
            .unwrap();
        registry
            .add_index("Book", IndexSpec::table("Book", ["author", "title"]).definition())
            .unwrap();
        assert_eq!(registry.indexes("Book", None).len(), 2);
        assert_eq!(registry.indexes("Book", Some(IndexType::Table)).len(), 1);
        assert!(registry.indexes("Person", None).is_empty());
        assert!(registry.index("Book", "author_title").is_some());
    }

    #[test]
    fn primary_key_fallback() {
        let mut registry = Registry::new();
        registry
            .create_schema(Schema::new("Person").primary_key("id"))
            .unwrap();
        assert_eq!(registry.primary_key(Some("Person"), "#"), "id");
        assert_eq!(registry.primary_key(Some("Book"), "#"), "#");
        assert_eq!(registry.primary_key(None, "#"), "#");
    }
}
