//! Basic indexing and search example.

use serde_json::json;
use sift::prelude::*;

fn main() -> Result<(), SiftError> {
    tracing_subscriber::fmt::init();

    println!("=== Sift Basic Search Example ===\n");

    let schema = Schema::builder()
        .string("title")
        .string("body")
        .number("year")
        .nested("author", Schema::builder().string("name").build())
        .build();
    let mut db = Database::new(schema);

    let posts = vec![
        json!({
            "id": "ownership",
            "title": "Understanding ownership",
            "body": "Ownership and borrowing are the heart of Rust.",
            "year": 2021,
            "author": { "name": "Ada" }
        }),
        json!({
            "id": "tries",
            "title": "Radix trees in practice",
            "body": "A compressed trie shares prefixes between tokens.",
            "year": 2022,
            "author": { "name": "Grace" }
        }),
        json!({
            "id": "ranking",
            "title": "Ranking with BM25",
            "body": "Term frequency and field length decide the score.",
            "year": 2023,
            "author": { "name": "Ada" }
        }),
    ];

    let docs = posts
        .into_iter()
        .map(parse_document)
        .collect::<Result<Vec<_>, _>>()?;
    db.insert_batch(docs)?;
    println!("Indexed {} posts\n", db.count());

    let queries = vec![
        ("prefix \"tr\"", Query::term("tr")),
        (
            "fuzzy \"ownreship\"",
            Query::builder()
                .term("ownreship")
                .options(SearchOptions::default().tolerance(2))
                .build(),
        ),
        (
            "author \"ada\"",
            Query::builder()
                .term("ada")
                .properties(vec!["author.name".to_string()])
                .build(),
        ),
        (
            "\"rust ranking\" with title boost",
            Query::builder()
                .term("rust ranking")
                .options(SearchOptions::default().boost("title", 2.0))
                .build(),
        ),
    ];

    for (label, query) in &queries {
        let results = db.search(query)?;
        println!("Query: {} -> {} hit(s) in {:?}", label, results.count, results.elapsed);
        for (i, hit) in results.hits.iter().enumerate() {
            println!("  {}. {} (score: {:.3})", i + 1, hit.id, hit.score);
        }
        println!();
    }

    Ok(())
}
