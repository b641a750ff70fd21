//! Saving one instance and merging it into another.

use serde_json::json;
use sift::prelude::*;

fn people() -> Database {
    Database::new(Schema::builder().string("name").number("age").build())
}

fn main() -> Result<(), SiftError> {
    tracing_subscriber::fmt::init();

    println!("=== Sift Snapshot Merge Example ===\n");

    let mut rome = people();
    rome.insert(parse_document(json!({ "id": "michele", "name": "Michele", "age": 31 }))?)?;

    let mut milan = people();
    milan.insert(parse_document(json!({ "id": "paolo", "name": "Paolo", "age": 28 }))?)?;

    // Ship the snapshot through JSON, as it would travel between processes.
    let json = milan.save().to_json_pretty()?;
    println!("Snapshot of the second instance:\n{json}\n");

    rome.load(&Snapshot::from_json(&json)?)?;
    println!("Merged instance holds {} documents", rome.count());

    for term in ["Paolo", "Michele", "P"] {
        let results = rome.search(&Query::term(term))?;
        let ids: Vec<&str> = results.hits.iter().map(|hit| hit.id.as_str()).collect();
        println!("  {term:>8}: {ids:?}");
    }

    Ok(())
}
