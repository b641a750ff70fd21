use serde_json::json;
use sift::prelude::*;

fn doc(value: serde_json::Value) -> Document {
  parse_document(value).unwrap()
}

fn people() -> Database {
  let mut db = Database::new(Schema::builder().string("name").number("age").build());
  db.insert(doc(json!({ "name": "John", "age": 30 }))).unwrap();
  db.insert(doc(json!({ "name": "Jane", "age": 25 }))).unwrap();
  db
}

fn articles() -> Database {
  let schema = Schema::builder()
    .string("title")
    .string("body")
    .nested("author", Schema::builder().string("name").boolean("staff").build())
    .build();

  let mut db = Database::new(schema);
  db.insert_batch(vec![
    doc(json!({
      "id": "rust",
      "title": "Rust ownership explained",
      "body": "Borrowing and lifetimes in practice",
      "author": { "name": "Ada", "staff": true }
    })),
    doc(json!({
      "id": "tries",
      "title": "Radix trees",
      "body": "A compressed trie stores shared prefixes once. Rust makes it easy.",
      "author": { "name": "Grace", "staff": false }
    })),
    doc(json!({
      "id": "ranking",
      "title": "Ranking with BM25",
      "body": "Term frequency and document length drive the score",
      "author": { "name": "Ada", "staff": true }
    })),
  ])
  .unwrap();
  db
}

fn ids(results: &SearchResults) -> Vec<&str> {
  results.hits.iter().map(|hit| hit.id.as_str()).collect()
}

#[test]
fn test_find_single_person() {
  let db = people();
  let results = db.search(&Query::term("Jane")).unwrap();

  assert_eq!(results.count, 1);
  assert_eq!(results.hits[0].document, doc(json!({ "name": "Jane", "age": 25 })));
}

#[test]
fn test_search_is_case_insensitive() {
  let db = people();
  let lower = db.search(&Query::term("john")).unwrap();
  let upper = db.search(&Query::term("JOHN")).unwrap();

  assert_eq!(lower.count, 1);
  assert_eq!(lower.hits, upper.hits);
}

#[test]
fn test_default_mode_is_prefix() {
  let db = people();
  let results = db.search(&Query::term("j")).unwrap();
  assert_eq!(results.count, 2);

  let exact = db
    .search(&Query::builder().term("j").options(SearchOptions::default().exact()).build())
    .unwrap();
  assert_eq!(exact.count, 0);
}

#[test]
fn test_fuzzy_tolerance() {
  let db = people();
  let query = |tolerance| {
    Query::builder()
      .term("jhn")
      .options(SearchOptions::default().tolerance(tolerance))
      .build()
  };

  assert_eq!(db.search(&query(0)).unwrap().count, 0);
  assert_eq!(ids(&db.search(&query(1)).unwrap()).len(), 1);
  assert_eq!(db.search(&query(2)).unwrap().count, 2);
  assert_eq!(
    db.search(&query(1)).unwrap().hits[0].document["name"],
    Value::from("John")
  );
}

#[test]
fn test_pagination_reports_total_count() {
  let db = articles();
  let all = db.search(&Query::term("rust")).unwrap();
  assert_eq!(all.count, 2);

  let page = db
    .search(
      &Query::builder()
        .term("rust")
        .options(SearchOptions::default().offset(1).limit(1))
        .build(),
    )
    .unwrap();
  assert_eq!(page.count, 2);
  assert_eq!(page.hits.len(), 1);
  assert_eq!(page.hits[0].id, all.hits[1].id);

  let past_end = db
    .search(&Query::builder().term("rust").options(SearchOptions::default().offset(5)).build())
    .unwrap();
  assert_eq!(past_end.count, 2);
  assert!(past_end.hits.is_empty());
}

#[test]
fn test_and_requires_every_token() {
  let db = articles();
  let or = db.search(&Query::term("rust ranking")).unwrap();
  assert_eq!(or.count, 3);

  let and = db
    .search(
      &Query::builder()
        .term("rust trie")
        .options(SearchOptions::default().exact().bool_mode(BoolMode::And))
        .build(),
    )
    .unwrap();
  assert_eq!(ids(&and), vec!["tries"]);
}

#[test]
fn test_restrict_to_properties() {
  let db = articles();
  let results = db
    .search(&Query::builder().term("rust").properties(vec!["title".to_string()]).build())
    .unwrap();
  assert_eq!(ids(&results), vec!["rust"]);
}

#[test]
fn test_boost_changes_order() {
  let db = articles();
  let body_first = db
    .search(
      &Query::builder()
        .term("rust")
        .options(SearchOptions::default().boost("body", 10.0))
        .build(),
    )
    .unwrap();
  let title_first = db
    .search(
      &Query::builder()
        .term("rust")
        .options(SearchOptions::default().boost("title", 10.0))
        .build(),
    )
    .unwrap();

  assert_eq!(ids(&body_first), vec!["tries", "rust"]);
  assert_eq!(ids(&title_first), vec!["rust", "tries"]);
}

#[test]
fn test_nested_properties_are_indexed() {
  let db = articles();
  let results = db
    .search(&Query::builder().term("ada").properties(vec!["author.name".to_string()]).build())
    .unwrap();
  assert_eq!(ids(&results), vec!["rust", "ranking"]);
}

#[test]
fn test_unknown_property_is_an_error() {
  let db = articles();
  let err = db
    .search(&Query::builder().term("rust").properties(vec!["subtitle".to_string()]).build())
    .unwrap_err();
  assert!(matches!(err, SiftError::UnknownField { field } if field == "subtitle"));

  // Non-string properties have no tree either.
  let err = db
    .search(&Query::builder().term("").properties(vec!["author.staff".to_string()]).build())
    .unwrap_err();
  assert!(matches!(err, SiftError::UnknownField { .. }));
}

#[test]
fn test_empty_term_lists_every_live_document() {
  let mut db = articles();
  db.remove("tries").unwrap();

  let results = db.search(&Query::term("")).unwrap();
  assert_eq!(results.count, 2);
  assert!(results.hits.iter().all(|hit| hit.score == 0.0));
  assert_eq!(ids(&results), vec!["rust", "ranking"]);
}

#[test]
fn test_removed_documents_never_match() {
  let mut db = people();
  let id = db.search(&Query::term("john")).unwrap().hits[0].id.clone();

  assert!(db.remove(&id).unwrap());
  assert_eq!(db.search(&Query::term("john")).unwrap().count, 0);
  assert_eq!(db.search(&Query::term("jane")).unwrap().count, 1);
  assert!(db.index().field("name").unwrap().tree().check_invariants().is_ok());
}

#[test]
fn test_stop_words_are_not_indexed() {
  let mut db = Database::builder(Schema::builder().string("title").build())
    .tokenizer(DefaultTokenizer::new().with_stop_words(["the"]))
    .build();
  db.insert(doc(json!({ "title": "The Lord of the Rings" }))).unwrap();

  let tree = db.index().field("title").unwrap().tree();
  assert!(!tree.contains("the"));
  assert!(tree.contains("rings"));
  assert_eq!(db.search(&Query::term("the lord")).unwrap().count, 1);
}

#[test]
fn test_whitespace_term_lists_every_live_document() {
  let db = people();
  assert_eq!(db.search(&Query::term("  \t ")).unwrap().count, 2);
}

#[test]
fn test_punctuation_only_term_matches_nothing() {
  let db = people();
  let results = db.search(&Query::term("?!")).unwrap();
  assert_eq!(results.count, 0);
  assert!(results.hits.is_empty());
}

#[test]
fn test_stop_word_only_term_matches_nothing() {
  let mut db = Database::builder(Schema::builder().string("title").build())
    .tokenizer(DefaultTokenizer::new().with_stop_words(["the"]))
    .build();
  db.insert(doc(json!({ "title": "The Lord of the Rings" }))).unwrap();

  let results = db.search(&Query::term("the")).unwrap();
  assert_eq!(results.count, 0);
  assert!(results.hits.is_empty());
}
