//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and the "books" data set most scenarios run against.

use kvdoc_codec::{Object, Value};
use kvdoc_core::{Database, EntityId, IndexSpec, PutOptions};

/// Title of the book that most scenarios look for.
pub const REINVENTING: &str = "Reinventing Organizations";

/// Runs a test with a fresh in-memory database.
///
/// # Example
///
/// ```rust
/// use kvdoc_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     assert!(db.schema("Book").is_none());
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let db = Database::open_in_memory();
    f(&db)
}

/// A book document.
pub fn book(title: &str, author: &str) -> Value {
    Value::object([("title", title), ("author", author)])
}

/// The three books of the data set.
///
/// 1. `Reinventing Organizations` by Laloux, with an explicit `Book@` id,
///    a `published` date and `NaN` cost.
/// 2. `Creating Organizations` by Laloux, with a bare uuid id (no collection).
/// 3. `Beyond Organizations` by Jones, classed as `Book` with no id.
pub fn books(published: i64) -> Vec<Value> {
    let first = Value::object([
        ("#", Value::from(EntityId::new(Some("Book")).to_string())),
        ("title", Value::from(REINVENTING)),
        ("author", Value::from("Laloux")),
        ("expires", Value::Number(f64::INFINITY)),
        ("cost", Value::Number(f64::NAN)),
        ("published", Value::Date(published)),
    ]);
    let second = Value::object([
        ("#", Value::from(EntityId::new(None).to_string())),
        ("title", Value::from("Creating Organizations")),
        ("author", Value::from("Laloux")),
    ]);
    let third = Object::with_class("Book")
        .with("title", "Beyond Organizations")
        .with("author", "Jones")
        .with("expires", f64::INFINITY)
        .with("cost", f64::NAN)
        .with("published", Value::Date(published));
    vec![first, second, Value::Object(third)]
}

/// A database holding the books data set.
pub struct BooksDb {
    /// The database.
    pub db: Database,
    /// Ids of the stored books, in [`books`] order.
    pub ids: Vec<String>,
    /// The `published` timestamp of the first and third book.
    pub published: i64,
}

impl std::ops::Deref for BooksDb {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Opens an in-memory database with the books data set.
///
/// `Book` gets a table index `author_title` and an object index over the
/// first book's fields. Two raw keys, `1 → 1` and `false → false`, sit
/// next to the books.
pub fn books_db() -> BooksDb {
    let db = Database::open_in_memory();
    db.create_index(IndexSpec::table("Book", ["author", "title"]))
        .expect("table index");
    db.create_index(IndexSpec::object(
        "Book",
        ["#", "title", "author", "expires", "cost", "published"],
    ))
    .expect("object index");

    let published = kvdoc_core::now_ms() - 1_000;
    let ids = books(published)
        .into_iter()
        .map(|book| db.put(book, PutOptions::new()).expect("put book"))
        .collect();
    db.set(&Value::from(1), Value::from(1)).expect("set 1");
    db.set(&Value::Bool(false), Value::Bool(false)).expect("set false");
    BooksDb { db, ids, published }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvdoc_core::{FindOptions, Query};

    #[test]
    fn books_db_layout() {
        let books = books_db();
        assert_eq!(books.ids.len(), 3);
        assert!(books.ids[0].starts_with("Book@"));
        assert!(!books.ids[1].contains('@'));
        assert!(books.ids[2].starts_with("Book@"));

        let all = books
            .find_all(Query::All, FindOptions::new().cname("Book"))
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn temp_db_is_empty() {
        with_temp_db(|db| {
            assert!(db.get(&Value::from("anything")).unwrap().is_none());
        });
    }
}
