//! Sift - an embeddable, in-memory full-text search engine.
//!
//! Sift indexes schema-validated documents into one compressed radix tree per
//! string property, ranks matches with BM25, and can save an instance to a
//! snapshot and merge that snapshot into another instance.
//!
//! ```rust
//! use sift::prelude::*;
//! use serde_json::json;
//!
//! let mut db = Database::new(Schema::builder().string("title").build());
//! db.insert(parse_document(json!({ "id": "1", "title": "The quick brown fox" })).unwrap()).unwrap();
//!
//! let results = db.search(&Query::term("qui")).unwrap();
//! assert_eq!(results.hits[0].id, "1");
//! ```

pub mod types;
pub mod error;
pub mod schema;
pub mod tokenizer;
pub mod radix;
pub mod id_store;
pub mod documents;
pub mod scoring;
pub mod index;
pub mod hooks;
pub mod engine;
pub mod snapshot;

pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::types::*;
    pub use crate::error::SiftError;
    pub use crate::schema::{lookup, parse_document, Document, FieldType, Schema, SchemaBuilder, Value};
    pub use crate::tokenizer::{DefaultTokenizer, Tokenizer};
    pub use crate::radix::{MatchKind, RadixTree};
    pub use crate::scoring::Bm25Params;
    pub use crate::hooks::Extension;
    pub use crate::engine::{Database, DatabaseBuilder};
    pub use crate::snapshot::Snapshot;
}
