//! Queries against the books data set.

use std::collections::HashMap;

use kvdoc_core::{
    ops, Database, FieldKey, FindOptions, Hit, IndexSpec, Object, Pattern, Predicate, PutOptions,
    Query, RegexLiteral, Selector, Slot, Value,
};
use kvdoc_testkit::{books_db, init_tracing, REINVENTING};

fn titles(hits: &[Hit]) -> Vec<&str> {
    hits.iter()
        .filter_map(|hit| hit.value.get("title").and_then(Value::as_text))
        .collect()
}

/// Three events whose `@Date` keys sort as 1000, 200, 30.
fn events_db() -> Database {
    let db = Database::open_in_memory();
    db.create_index(IndexSpec::object("Event", ["at", "n"])).unwrap();
    for (name, at, n) in [("late", 1000, 1), ("mid", 200, 5), ("early", 30, 10)] {
        let event = Object::new().with("name", name).with("at", Value::Date(at)).with("n", n);
        db.put(Value::Object(event), PutOptions::new().cname("Event")).unwrap();
    }
    db
}

fn names(hits: &[Hit]) -> Vec<&str> {
    let mut names: Vec<&str> = hits
        .iter()
        .filter_map(|hit| hit.value.get("name").and_then(Value::as_text))
        .collect();
    names.sort_unstable();
    names
}

fn find_events(db: &Database, pattern: Pattern, options: FindOptions) -> Vec<Hit> {
    db.find_all(pattern, options.cname("Event")).unwrap()
}

#[test]
fn get_primitive() {
    init_tracing();
    let db = books_db();
    let entry = db.get(&Value::from(1)).unwrap().unwrap();
    assert_eq!(entry.value, Value::from(1));
    assert_eq!(entry.key, Value::from(1));
}

#[test]
fn key_predicate_finds_non_string_keys() {
    init_tracing();
    let db = books_db();
    let not_text = Predicate::from_fn(|v| (!matches!(v, Value::Text(_))).then(|| v.clone()));
    let hits = db
        .find_all(vec![Slot::from(not_text)], FindOptions::new())
        .unwrap();
    assert_eq!(hits.len(), 2);
    let keys: Vec<Value> = hits.into_iter().map(|hit| hit.key).collect();
    assert!(keys.contains(&Value::Bool(false)));
    assert!(keys.contains(&Value::from(1)));
}

#[test]
fn find_title_with_and_without_cname() {
    init_tracing();
    let db = books_db();
    let pattern = Pattern::new().field("title", REINVENTING);

    let hits = db.find_all(pattern.clone(), FindOptions::new().cname("Book")).unwrap();
    assert_eq!(titles(&hits), vec![REINVENTING]);
    assert_eq!(hits[0].key, Value::from(db.ids[0].as_str()));
    assert_eq!(hits[0].value.as_object().unwrap().class(), Some("Book"));

    let hits = db.find_all(pattern, FindOptions::new()).unwrap();
    assert_eq!(titles(&hits), vec![REINVENTING]);
}

#[test]
fn unclassed_entities_are_not_indexed() {
    init_tracing();
    let db = books_db();
    let hits = db
        .find_all(Pattern::new().field("title", "Creating Organizations"), FindOptions::new())
        .unwrap();
    assert!(hits.is_empty());

    // Still reachable by key.
    let entry = db.get(&Value::from(db.ids[1].as_str())).unwrap().unwrap();
    assert_eq!(entry.value.get("author"), Some(&Value::from("Laloux")));
}

#[test]
fn table_index_full_and_partial() {
    init_tracing();
    let db = books_db();
    let options = || FindOptions::new().cname("Book").index_name("author_title");

    let full = Pattern::new().field("author", "Laloux").field("title", REINVENTING);
    assert_eq!(titles(&db.find_all(full, options()).unwrap()), vec![REINVENTING]);

    let partial = Pattern::new().field("title", REINVENTING);
    assert_eq!(titles(&db.find_all(partial, options()).unwrap()), vec![REINVENTING]);

    let creating = Pattern::new().field("title", "Creating Organizations");
    assert!(db.find_all(creating, options()).unwrap().is_empty());
}

#[test]
fn index_name_needs_a_known_index() {
    let db = books_db();
    let pattern = Pattern::new().field("title", REINVENTING);
    assert!(db
        .find_all(pattern.clone(), FindOptions::new().cname("Book").index_name("nope"))
        .is_err());
    assert!(db
        .find_all(pattern, FindOptions::new().index_name("author_title"))
        .is_err());
}

#[test]
fn regex_title() {
    let db = books_db();
    let re = RegexLiteral::new("Reinventing", "").unwrap();
    let hits = db
        .find_all(Pattern::new().field("title", re), FindOptions::new().cname("Book"))
        .unwrap();
    assert_eq!(titles(&hits), vec![REINVENTING]);
}

#[test]
fn dates_match_by_time() {
    let db = books_db();
    let hits = db
        .find_all(
            Pattern::new().field("published", Value::Date(db.published)),
            FindOptions::new().cname("Book"),
        )
        .unwrap();
    assert_eq!(hits.len(), 2);

    let hits = db
        .find_all(
            Pattern::new().field("published", ops::lt(Value::Date(kvdoc_core::now_ms()))),
            FindOptions::new().cname("Book"),
        )
        .unwrap();
    assert_eq!(hits.len(), 2);

    let hits = db
        .find_all(
            Pattern::new().field("published", ops::gt(Value::Date(kvdoc_core::now_ms()))),
            FindOptions::new().cname("Book"),
        )
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn echoes_matches_by_sound() {
    let db = books_db();
    let hits = db
        .find_all(
            Pattern::new().field("author", ops::echoes("Lalox")),
            FindOptions::new().cname("Book"),
        )
        .unwrap();
    assert_eq!(titles(&hits), vec![REINVENTING]);
}

#[test]
fn regex_field_names() {
    let db = books_db();
    let key = FieldKey::parse("/author/");
    let hits = db
        .find_all(Pattern::new().field(key, "Laloux"), FindOptions::new().cname("Book"))
        .unwrap();
    assert_eq!(titles(&hits), vec![REINVENTING]);
}

#[test]
fn fuzzy_match_scores_partial_hits() {
    let db = books_db();
    let pattern = Pattern::new()
        .field("title", "Building Organizations")
        .field("author", "Laloux");

    let strict = db.find_all(pattern.clone(), FindOptions::new().cname("Book")).unwrap();
    assert!(strict.is_empty());

    let fuzzy = db
        .find_all(pattern, FindOptions::new().cname("Book").min_score(0.5))
        .unwrap();
    assert_eq!(fuzzy.len(), 1);
    assert!((fuzzy[0].score - 0.5).abs() < f64::EPSILON);
}

#[test]
fn strict_match_needs_every_term() {
    let db = books_db();
    let pattern = Pattern::new().field("title", REINVENTING).field("author", "Jones");
    assert!(db.find_all(pattern, FindOptions::new().cname("Book")).unwrap().is_empty());
}

#[test]
fn find_all_books() {
    let db = books_db();
    assert_eq!(db.find_all(Query::All, FindOptions::new().cname("Book")).unwrap().len(), 2);
    assert_eq!(db.find_all(Query::All, FindOptions::new()).unwrap().len(), 3);
}

#[test]
fn id_in_pattern_filters() {
    let db = books_db();
    let pattern = Pattern::new().field("#", db.ids[2].as_str());
    let hits = db.find_all(pattern, FindOptions::new()).unwrap();
    assert_eq!(titles(&hits), vec!["Beyond Organizations"]);

    let pattern = Pattern::new()
        .field("#", db.ids[2].as_str())
        .field("author", "Laloux");
    assert!(db.find_all(pattern, FindOptions::new()).unwrap().is_empty());
}

#[test]
fn limit_offset_and_counts() {
    let db = books_db();
    let all = db.find_all(Query::All, FindOptions::new()).unwrap();
    assert!(all.iter().all(|hit| hit.total_count == 3));
    assert_eq!(all.iter().map(|hit| hit.count).collect::<Vec<_>>(), vec![1, 2, 3]);

    let page = db
        .find_all(Query::All, FindOptions::new().offset(1).limit(1))
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].offset, 1);
    assert_eq!(page[0].key, all[1].key);
}

#[test]
fn value_match_and_projection() {
    let db = books_db();
    let options = FindOptions::new()
        .cname("Book")
        .value_match(Pattern::new().field("author", "Jones"))
        .select(Selector::new().keep("title"));
    let hits = db.find_all(Query::All, options).unwrap();
    assert_eq!(hits.len(), 1);
    let projected = hits[0].value.as_object().unwrap();
    assert_eq!(projected.len(), 1);
    assert_eq!(projected.get("title"), Some(&Value::from("Beyond Organizations")));
}

#[test]
fn cursor_is_lazy() {
    let db = books_db();
    let mut cursor = db.find(Query::All, FindOptions::new().cname("Book")).unwrap();
    assert_eq!(cursor.total_count(), 2);
    assert!(cursor.next().unwrap().is_ok());
    assert!(cursor.next().unwrap().is_ok());
    assert!(cursor.next().is_none());
}

#[test]
fn unindexed_fields_still_constrain() {
    init_tracing();
    let db = books_db();
    let pattern = Pattern::new().field("title", REINVENTING).field("publisher", "Nelson Parker");
    assert!(db.find_all(pattern, FindOptions::new().cname("Book")).unwrap().is_empty());

    let only_unindexed = Pattern::new().field("publisher", "Nelson Parker");
    assert!(db
        .find_all(only_unindexed.clone(), FindOptions::new().cname("Book"))
        .unwrap()
        .is_empty());
    assert!(db.find_all(only_unindexed, FindOptions::new()).unwrap().is_empty());
}

#[test]
fn date_ranges_scan_past_out_of_order_keys() {
    init_tracing();
    let db = events_db();
    let hits = find_events(&db, Pattern::new().field("at", ops::lt(Value::Date(500))), FindOptions::new());
    assert_eq!(names(&hits), vec!["early", "mid"]);

    let hits = find_events(&db, Pattern::new().field("at", ops::lte(Value::Date(200))), FindOptions::new());
    assert_eq!(names(&hits), vec!["early", "mid"]);

    let hits = find_events(
        &db,
        Pattern::new().field("at", ops::between(Value::Date(100), Value::Date(1500))),
        FindOptions::new(),
    );
    assert_eq!(names(&hits), vec!["late", "mid"]);
}

#[test]
fn number_ranges_stop_at_the_bound() {
    let db = events_db();
    let hits = find_events(&db, Pattern::new().field("n", ops::lt(6)), FindOptions::new());
    assert_eq!(names(&hits), vec!["late", "mid"]);

    let hits = find_events(&db, Pattern::new().field("n", ops::between(2, 7)), FindOptions::new());
    assert_eq!(names(&hits), vec!["mid"]);
}

#[test]
fn ranges_combine_in_strict_and_fuzzy_mode() {
    let db = events_db();
    let pattern = Pattern::new()
        .field("at", ops::lt(Value::Date(500)))
        .field("n", ops::lt(6));

    let strict = find_events(&db, pattern.clone(), FindOptions::new());
    assert_eq!(names(&strict), vec!["mid"]);

    let fuzzy = find_events(&db, pattern, FindOptions::new().min_score(0.5));
    assert_eq!(names(&fuzzy), vec!["early", "late", "mid"]);
    let scores: HashMap<&str, f64> = fuzzy
        .iter()
        .filter_map(|hit| Some((hit.value.get("name")?.as_text()?, hit.score)))
        .collect();
    assert!((scores["mid"] - 1.0).abs() < f64::EPSILON);
    assert!((scores["late"] - 0.5).abs() < f64::EPSILON);
    assert!((scores["early"] - 0.5).abs() < f64::EPSILON);

    let none = find_events(
        &db,
        Pattern::new().field("at", ops::lt(Value::Date(10))).field("n", ops::lt(0)),
        FindOptions::new().min_score(0.5),
    );
    assert!(none.is_empty());
}
