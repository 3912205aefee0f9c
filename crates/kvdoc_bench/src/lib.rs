//! Benchmark utilities.

#![warn(missing_docs)]

use kvdoc_codec::Value;
use kvdoc_core::{Database, IndexSpec, PutOptions};
use rand::seq::SliceRandom;
use rand::Rng;

const AUTHORS: &[&str] = &["Laloux", "Jones", "Okafor", "Lindqvist", "Moreau"];

/// Generate a random book document.
pub fn random_book(rng: &mut impl Rng) -> Value {
    let author = AUTHORS.choose(rng).copied().unwrap_or("Laloux");
    Value::object([
        ("title", Value::from(format!("Book {}", rng.gen_range(0..10_000)))),
        ("author", Value::from(author)),
        ("year", Value::from(rng.gen_range(1950..2025))),
        ("pages", Value::from(rng.gen_range(50..900))),
    ])
}

/// Generate a document nested `depth` levels deep with `width` fields per level.
pub fn nested_document(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::from("leaf")
    } else {
        Value::object((0..width).map(|i| (format!("key_{i}"), nested_document(depth - 1, width))))
    }
}

/// Open an in-memory database with `count` indexed books.
pub fn populated_db(count: usize) -> (Database, Vec<String>) {
    let db = Database::open_in_memory();
    db.create_index(IndexSpec::object("Book", ["title", "author", "year"]))
        .unwrap_or_else(|e| panic!("index: {e}"));
    let mut rng = rand::thread_rng();
    let ids = (0..count)
        .map(|_| {
            db.put(random_book(&mut rng), PutOptions::new().cname("Book"))
                .unwrap_or_else(|e| panic!("put: {e}"))
        })
        .collect();
    (db, ids)
}
