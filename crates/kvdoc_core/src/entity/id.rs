//! Entity identifier.

use std::fmt;
use uuid::Uuid;

/// Identifier of a stored entity.
///
/// Ids are written as `"<cname>@<uuid>"` for entities that belong to a
/// collection, or as a bare uuid otherwise. They are:
/// - Globally unique within a store
/// - Immutable once assigned
/// - Self-describing: the collection name can be read back from the id
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    cname: Option<String>,
    uuid: Uuid,
}

impl EntityId {
    /// Creates a new random id, optionally scoped to a collection.
    #[must_use]
    pub fn new(cname: Option<&str>) -> Self {
        Self {
            cname: cname.map(str::to_string),
            uuid: Uuid::new_v4(),
        }
    }

    /// Creates an id from its parts.
    #[must_use]
    pub fn from_parts(cname: Option<&str>, uuid: Uuid) -> Self {
        Self {
            cname: cname.map(str::to_string),
            uuid,
        }
    }

    /// Parses `"<cname>@<uuid>"` or a bare uuid.
    ///
    /// Returns `None` if the uuid part is not a hyphenated uuid.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (cname, uuid) = match text.rsplit_once('@') {
            Some((cname, uuid)) => (Some(cname), uuid),
            None => (None, text),
        };
        if uuid.len() != 36 {
            return None;
        }
        let uuid = Uuid::parse_str(uuid).ok()?;
        Some(Self::from_parts(cname.filter(|c| !c.is_empty()), uuid))
    }

    /// The collection name, if the id carries one.
    #[must_use]
    pub fn cname(&self) -> Option<&str> {
        self.cname.as_deref()
    }

    /// The uuid part.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// Returns `true` if `text` is shaped like an entity id.
#[must_use]
pub fn is_id(text: &str) -> bool {
    EntityId::parse(text).is_some()
}

/// Reads the collection name out of an id string.
#[must_use]
pub fn cname_of(text: &str) -> Option<String> {
    EntityId::parse(text).and_then(|id| id.cname)
}

/// Inclusive lower bound of the ids of `cname`.
#[must_use]
pub fn id_range_start(cname: &str) -> String {
    format!("{cname}@")
}

/// Exclusive upper bound of the ids of `cname`.
#[must_use]
pub fn id_range_end(cname: &str) -> String {
    format!("{cname}@{}", char::MAX)
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cname {
            Some(cname) => write!(f, "{cname}@{}", self.uuid),
            None => write!(f, "{}", self.uuid),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = EntityId::new(Some("Book"));
        let id2 = EntityId::new(Some("Book"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let id = EntityId::new(Some("Book"));
        let text = id.to_string();
        assert!(text.starts_with("Book@"));
        assert_eq!(EntityId::parse(&text), Some(id));

        let bare = EntityId::new(None);
        assert_eq!(EntityId::parse(&bare.to_string()), Some(bare));
    }

    #[test]
    fn cname_extraction() {
        let text = "Book@1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed";
        assert!(is_id(text));
        assert_eq!(cname_of(text).as_deref(), Some("Book"));
        assert_eq!(cname_of("1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed"), None);
    }

    #[test]
    fn non_ids() {
        assert!(!is_id("Book"));
        assert!(!is_id("Book@123"));
        assert!(!is_id(""));
        assert!(!is_id("Book@1b9d6bcdbbfd4b2d9b5dab8dfbbd4bed"));
    }

    #[test]
    fn id_range_brackets_collection() {
        let id = EntityId::new(Some("Book")).to_string();
        assert!(id_range_start("Book") <= id);
        assert!(id < id_range_end("Book"));
        let other = EntityId::new(Some("Booking")).to_string();
        assert!(!(id_range_start("Book") <= other && other < id_range_end("Book")));
    }
}
