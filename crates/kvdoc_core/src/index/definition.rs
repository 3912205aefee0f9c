//! Collection and index definitions.

use serde::{Deserialize, Serialize};

/// Key prefix of object-index entries.
pub const OBJECT_INDEX_PREFIX: &str = "__oindex__";

/// Key prefix of table-index entries.
pub const TABLE_INDEX_PREFIX: &str = "__tindex__";

/// Shape of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// One entry per leaf path of an entity.
    Object,
    /// One composite entry per declared key list.
    Table,
}

impl IndexType {
    /// Namespace prefix of this index type's entries.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            IndexType::Object => OBJECT_INDEX_PREFIX,
            IndexType::Table => TABLE_INDEX_PREFIX,
        }
    }
}

/// A registered index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique within its collection.
    pub name: String,
    /// Index shape.
    #[serde(rename = "type")]
    pub index_type: IndexType,
    /// Ordered property paths (dotted).
    pub keys: Vec<String>,
    /// Whether one tuple may belong to a single entity only.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Default index name: the keys joined with `_`.
    #[must_use]
    pub fn default_name(keys: &[String]) -> String {
        keys.join("_")
    }
}

/// Request to create an index.
///
/// # Example
///
/// ```rust
/// use kvdoc_core::{IndexSpec, IndexType};
///
/// let spec = IndexSpec::table("Book", ["author", "title"]).unique();
/// assert_eq!(spec.index_type, IndexType::Table);
/// assert_eq!(spec.resolved_name(), "author_title");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexSpec {
    /// Collection the index belongs to.
    pub cname: Option<String>,
    /// Index shape; object when unset.
    pub index_type: IndexType,
    /// Property paths.
    pub keys: Vec<String>,
    /// Optional explicit name.
    pub name: Option<String>,
    /// Uniqueness flag.
    pub unique: bool,
}

impl Default for IndexType {
    fn default() -> Self {
        IndexType::Object
    }
}

impl IndexSpec {
    /// An object index over `keys`.
    pub fn object<I, S>(cname: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cname: Some(cname.into()),
            index_type: IndexType::Object,
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A table index over `keys`.
    pub fn table<I, S>(cname: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_type: IndexType::Table,
            ..Self::object(cname, keys)
        }
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The name the index will be registered under.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| IndexDefinition::default_name(&self.keys))
    }

    pub(crate) fn definition(&self) -> IndexDefinition {
        IndexDefinition {
            name: self.resolved_name(),
            index_type: self.index_type,
            keys: self.keys.clone(),
            unique: self.unique,
        }
    }
}

/// A collection declaration.
///
/// Schemas can be written in Rust or loaded from JSON:
///
/// ```rust
/// use kvdoc_core::Schema;
///
/// let schema: Schema = serde_json::from_str(r#"{
///     "cname": "Book",
///     "title": "A book",
///     "indexes": [{"name": "author_title", "type": "table", "keys": ["author", "title"]}]
/// }"#).unwrap();
/// assert_eq!(schema.indexes.len(), 1);
/// assert!(schema.primary_key.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collection name.
    pub cname: String,
    /// Primary-key field; the configured default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl Schema {
    /// Creates an empty schema for `cname`.
    #[must_use]
    pub fn new(cname: impl Into<String>) -> Self {
        Self {
            cname: cname.into(),
            ..Self::default()
        }
    }

    /// Sets the primary-key field.
    #[must_use]
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Finds an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_spec_builders() {
        let spec = IndexSpec::object("Book", ["title"]).named("by_title");
        assert_eq!(spec.index_type, IndexType::Object);
        assert_eq!(spec.resolved_name(), "by_title");
        let def = spec.definition();
        assert_eq!(def.keys, vec!["title".to_string()]);
        assert!(!def.unique);
    }

    #[test]
    fn prefixes_differ() {
        assert_ne!(IndexType::Object.prefix(), IndexType::Table.prefix());
    }

    #[test]
    fn schema_serde_roundtrip() {
        let mut schema = Schema::new("Person").primary_key("id");
        schema.indexes.push(IndexSpec::table("Person", ["name"]).unique().definition());
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"primaryKey\":\"id\""));
        assert!(json.contains("\"type\":\"table\""));
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
        assert!(back.index("name").unwrap().unique);
    }
}
