//! The search engine instance and its public operations.

use crate::documents::DocumentsStore;
use crate::error::{Result, SiftError};
use crate::hooks::Extension;
use crate::id_store::InternalIdStore;
use crate::index::{Index, SearchParams};
use crate::schema::{Document, Schema, Value};
use crate::scoring::Bm25Params;
use crate::snapshot::{self, Snapshot};
use crate::tokenizer::{DefaultTokenizer, Tokenizer};
use crate::types::{ExternalId, InternalId, Query, SearchHit, SearchResults};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Language passed to the tokenizer when none is configured.
pub const DEFAULT_LANGUAGE: &str = "english";

/// An embeddable full-text search instance.
///
/// `Database` owns everything an instance needs: the internal ID store, the
/// documents store and the per-property radix tree index. Every operation
/// takes the instance by reference; there is no process-wide state.
///
/// Writes (`insert`, `remove`, `update`, `load`) take `&mut self`, so the
/// borrow checker serializes them. Reads take `&self`.
///
/// Create one with [`Database::new`] or, to configure the tokenizer, BM25
/// parameters or extensions, with [`Database::builder`].
///
/// # Examples
///
/// ```rust
/// use sift::prelude::*;
/// use serde_json::json;
///
/// let schema = Schema::builder().string("name").number("age").build();
/// let mut db = Database::new(schema);
///
/// db.insert(parse_document(json!({ "name": "John", "age": 30 })).unwrap()).unwrap();
/// db.insert(parse_document(json!({ "name": "Jane", "age": 25 })).unwrap()).unwrap();
///
/// let results = db.search(&Query::term("Jane")).unwrap();
/// assert_eq!(results.count, 1);
/// assert_eq!(results.hits[0].document["name"], Value::from("Jane"));
/// ```
pub struct Database {
  pub(crate) schema: Schema,
  pub(crate) id_store: InternalIdStore,
  pub(crate) docs: DocumentsStore,
  pub(crate) index: Index,
  pub(crate) tokenizer: Arc<dyn Tokenizer>,
  pub(crate) language: String,
  extensions: Vec<Box<dyn Extension>>,
}

impl Database {
  /// Creates an empty instance with the default tokenizer and scoring.
  pub fn new(schema: Schema) -> Self {
    Self::builder(schema).build()
  }

  /// Creates a new `DatabaseBuilder` for `schema`.
  pub fn builder(schema: Schema) -> DatabaseBuilder {
    DatabaseBuilder::new(schema)
  }

  /// The schema this instance validates against.
  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  /// The per-property index.
  pub fn index(&self) -> &Index {
    &self.index
  }

  /// Number of live documents.
  pub fn count(&self) -> usize {
    self.docs.count()
  }

  /// Returns the live document stored under `id`.
  pub fn get(&self, id: &str) -> Option<&Document> {
    self.docs.get(self.id_store.internal_id(id)?)
  }

  /// Inserts a document and returns its external ID.
  ///
  /// The external ID is the document's `id` property when it is a string;
  /// otherwise a UUID is generated. The document is validated against the
  /// schema and the `before_insert` hooks run before anything is mutated.
  ///
  /// # Errors
  ///
  /// - [`SiftError::SchemaMismatch`] if a value has the wrong type, including
  ///   a non-string `id`.
  /// - [`SiftError::DuplicateId`] if a live document already uses the ID.
  /// - [`SiftError::Hook`] if a hook fails. A failing `after_insert` hook is
  ///   reported after the document has been committed.
  pub fn insert(&mut self, doc: Document) -> Result<ExternalId> {
    let id = self.prepare_insert(&doc)?;
    run_before_hooks(&self.extensions, "before_insert", |ext| ext.before_insert(&id, &doc))?;

    let internal = self.commit_insert(&id, doc)?;
    debug!(id = %id, internal, "inserted document");

    self.after_insert(&id, internal)?;
    Ok(id)
  }

  /// Inserts several documents.
  ///
  /// Every document is validated and every `before_insert` hook runs before
  /// the first one is committed, so a failure there leaves the instance
  /// untouched.
  pub fn insert_batch(&mut self, docs: Vec<Document>) -> Result<Vec<ExternalId>> {
    let mut ids = Vec::with_capacity(docs.len());
    let mut batch = HashSet::with_capacity(docs.len());

    for doc in &docs {
      let id = self.prepare_insert(doc)?;
      if !batch.insert(id.clone()) {
        return Err(SiftError::DuplicateId { id });
      }
      ids.push(id);
    }
    for (id, doc) in ids.iter().zip(&docs) {
      run_before_hooks(&self.extensions, "before_insert", |ext| ext.before_insert(id, doc))?;
    }

    let mut internals = Vec::with_capacity(docs.len());
    for (id, doc) in ids.iter().zip(docs) {
      internals.push(self.commit_insert(id, doc)?);
    }
    info!(count = ids.len(), "inserted document batch");

    let mut first_error = None;
    for (id, internal) in ids.iter().zip(internals) {
      if let Err(err) = self.after_insert(id, internal) {
        if first_error.is_none() {
          first_error = Some(err);
        }
      }
    }
    match first_error {
      Some(err) => Err(err),
      None => Ok(ids),
    }
  }

  /// Removes a document.
  ///
  /// Returns `Ok(false)` if the document was already removed.
  ///
  /// # Errors
  ///
  /// - [`SiftError::NotFound`] if the ID was never inserted.
  /// - [`SiftError::Hook`] if a hook fails. A failing `after_remove` hook is
  ///   reported after the removal has been committed.
  pub fn remove(&mut self, id: &str) -> Result<bool> {
    let internal = self.internal_id(id)?;
    let Some(doc) = self.docs.get(internal) else {
      return Ok(false);
    };
    run_before_hooks(&self.extensions, "before_remove", |ext| ext.before_remove(id, doc))?;

    let removed = self.commit_remove(internal);
    debug!(id = %id, internal, "removed document");

    if let Some(doc) = removed {
      run_after_hooks(&self.extensions, "after_remove", |ext| ext.after_remove(id, &doc))?;
    }
    Ok(true)
  }

  /// Removes several documents and returns how many were live.
  ///
  /// All IDs are resolved before any hook runs, and all `before_remove`
  /// hooks run before the first removal. Repeated IDs count once.
  pub fn remove_batch<I, S>(&mut self, ids: I) -> Result<usize>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();
    for id in ids {
      let id = id.as_ref();
      let internal = self.internal_id(id)?;
      if self.docs.is_live(internal) && seen.insert(internal) {
        targets.push((id.to_string(), internal));
      }
    }

    for (id, internal) in &targets {
      if let Some(doc) = self.docs.get(*internal) {
        run_before_hooks(&self.extensions, "before_remove", |ext| ext.before_remove(id, doc))?;
      }
    }

    let mut removed = Vec::with_capacity(targets.len());
    for (id, internal) in targets {
      if let Some(doc) = self.commit_remove(internal) {
        removed.push((id, doc));
      }
    }
    info!(count = removed.len(), "removed document batch");

    let mut first_error = None;
    for (id, doc) in &removed {
      if let Err(err) = run_after_hooks(&self.extensions, "after_remove", |ext| ext.after_remove(id, doc)) {
        if first_error.is_none() {
          first_error = Some(err);
        }
      }
    }
    match first_error {
      Some(err) => Err(err),
      None => Ok(removed.len()),
    }
  }

  /// Replaces the document stored under `id` with `doc`.
  ///
  /// The new document keeps `id` unless it carries its own string `id`.
  /// Validation and both `before_remove` and `before_insert` hooks run before
  /// anything changes; a failure there leaves the old document in place. A
  /// failing after-hook is reported once both halves have been committed.
  pub fn update(&mut self, id: &str, mut doc: Document) -> Result<ExternalId> {
    let internal = self.internal_id(id)?;
    let Some(old) = self.docs.get(internal) else {
      return Err(SiftError::NotFound { id: id.to_string() });
    };

    doc.entry("id".to_string()).or_insert_with(|| Value::from(id));
    self.schema.validate(&doc)?;
    let new_id = resolve_id(&doc)?;
    if new_id != id && self.is_live(&new_id) {
      return Err(SiftError::DuplicateId { id: new_id });
    }

    run_before_hooks(&self.extensions, "before_remove", |ext| ext.before_remove(id, old))?;
    run_before_hooks(&self.extensions, "before_insert", |ext| ext.before_insert(&new_id, &doc))?;

    let removed = self.commit_remove(internal);
    let new_internal = self.commit_insert(&new_id, doc)?;
    debug!(id = %id, new_id = %new_id, internal = new_internal, "updated document");

    let mut result = Ok(());
    if let Some(old) = removed {
      result = run_after_hooks(&self.extensions, "after_remove", |ext| ext.after_remove(id, &old));
    }
    let inserted = self.after_insert(&new_id, new_internal);
    result.and(inserted).map(|()| new_id)
  }

  /// Runs a full-text search.
  ///
  /// The query term is tokenized with the instance tokenizer, each token is
  /// looked up in the requested properties, and the candidates are ranked by
  /// BM25. `count` is the number of matches before pagination. An empty or
  /// whitespace-only term matches every live document with a score of 0; a
  /// term the tokenizer reduces to nothing (punctuation, stop words) matches
  /// nothing.
  ///
  /// # Errors
  ///
  /// [`SiftError::UnknownField`] if `query.properties` names a property that
  /// is not a string field of the schema.
  pub fn search(&self, query: &Query) -> Result<SearchResults> {
    let started = Instant::now();

    let properties: Vec<String> = match &query.properties {
      Some(properties) => properties.clone(),
      None => self.index.properties().map(String::from).collect(),
    };
    if let Some(unknown) = properties.iter().find(|p| self.index.field(p).is_none()) {
      return Err(SiftError::UnknownField {
        field: unknown.clone(),
      });
    }
    let tokens = self.tokenizer.tokenize(&query.term, &self.language);

    let mut ranked: Vec<(InternalId, f32)> = if query.term.trim().is_empty() {
      self.docs.iter().map(|(id, _)| (id, 0.0)).collect()
    } else if tokens.is_empty() {
      Vec::new()
    } else {
      let params = SearchParams {
        mode: query.options.mode,
        bool_mode: query.options.bool_mode,
        boost: &query.options.boost,
        total_documents: self.docs.count(),
      };
      self.index.search(&tokens, &properties, &params)?
    };
    ranked.retain(|&(internal, _)| self.docs.is_live(internal));

    let hits: Vec<SearchHit> = ranked
      .iter()
      .skip(query.options.offset)
      .take(query.options.limit)
      .filter_map(|&(internal, score)| {
        Some(SearchHit {
          id: self.id_store.external_id(internal)?.to_string(),
          score,
          document: self.docs.get(internal)?.clone(),
        })
      })
      .collect();

    let elapsed = started.elapsed();
    debug!(
      term = %query.term,
      count = ranked.len(),
      returned = hits.len(),
      elapsed_us = elapsed.as_micros() as u64,
      "search completed"
    );

    Ok(SearchResults {
      count: ranked.len(),
      hits,
      elapsed,
    })
  }

  /// Serializes the instance into a [`Snapshot`].
  pub fn save(&self) -> Snapshot {
    snapshot::save(self)
  }

  /// Merges a snapshot into this instance.
  ///
  /// Load is additive: documents whose external ID is already live here are
  /// skipped, everything else gets a fresh local internal ID. The snapshot
  /// is validated whole before anything is mutated.
  ///
  /// # Errors
  ///
  /// - [`SiftError::MalformedSnapshot`] if the snapshot is structurally
  ///   invalid.
  /// - [`SiftError::SchemaMismatch`] if a property indexed by the snapshot
  ///   is not a string property here.
  pub fn load(&mut self, snapshot: &Snapshot) -> Result<()> {
    snapshot::load(self, snapshot)
  }

  fn internal_id(&self, id: &str) -> Result<InternalId> {
    self
      .id_store
      .internal_id(id)
      .ok_or_else(|| SiftError::NotFound { id: id.to_string() })
  }

  fn is_live(&self, id: &str) -> bool {
    self
      .id_store
      .internal_id(id)
      .is_some_and(|internal| self.docs.is_live(internal))
  }

  /// Validation that must pass before any mutation.
  fn prepare_insert(&self, doc: &Document) -> Result<ExternalId> {
    self.schema.validate(doc)?;
    let id = resolve_id(doc)?;
    if self.is_live(&id) {
      return Err(SiftError::DuplicateId { id });
    }
    Ok(id)
  }

  fn commit_insert(&mut self, id: &str, doc: Document) -> Result<InternalId> {
    let internal = self.id_store.get_or_create(id);
    self.docs.insert(internal, doc)?;
    if let Some(doc) = self.docs.get(internal) {
      self
        .index
        .insert_document(internal, doc, self.tokenizer.as_ref(), &self.language);
    }
    Ok(internal)
  }

  fn commit_remove(&mut self, internal: InternalId) -> Option<Document> {
    let doc = self.docs.remove(internal)?;
    self.index.remove_document(internal);
    Some(doc)
  }

  fn after_insert(&self, id: &str, internal: InternalId) -> Result<()> {
    match self.docs.get(internal) {
      Some(doc) => run_after_hooks(&self.extensions, "after_insert", |ext| ext.after_insert(id, doc)),
      None => Ok(()),
    }
  }
}

/// External ID of `doc`: its string `id` property, or a new UUID.
fn resolve_id(doc: &Document) -> Result<ExternalId> {
  match doc.get("id") {
    Some(Value::String(id)) => Ok(id.clone()),
    Some(other) => Err(SiftError::SchemaMismatch {
      field: "id".to_string(),
      expected: "string".to_string(),
      found: other.kind().to_string(),
    }),
    None => Ok(Uuid::new_v4().to_string()),
  }
}

/// Runs a pre-mutation hook on every extension, stopping at the first failure.
fn run_before_hooks<F>(extensions: &[Box<dyn Extension>], hook: &'static str, call: F) -> Result<()>
where
  F: Fn(&dyn Extension) -> std::result::Result<(), String>,
{
  for ext in extensions {
    call(ext.as_ref()).map_err(|message| SiftError::Hook { hook, message })?;
  }
  Ok(())
}

/// Runs a post-mutation hook on every extension. Failures do not stop the
/// remaining hooks; the first one is returned.
fn run_after_hooks<F>(extensions: &[Box<dyn Extension>], hook: &'static str, call: F) -> Result<()>
where
  F: Fn(&dyn Extension) -> std::result::Result<(), String>,
{
  let mut first_error = None;
  for ext in extensions {
    if let Err(message) = call(ext.as_ref()) {
      warn!(hook, %message, "hook failed after commit; mutation is kept");
      if first_error.is_none() {
        first_error = Some(SiftError::Hook { hook, message });
      }
    }
  }
  match first_error {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

/// A builder for creating `Database` instances.
///
/// # Examples
///
/// ```
/// use sift::prelude::*;
///
/// let db = Database::builder(Schema::builder().string("title").build())
///     .tokenizer(DefaultTokenizer::new().with_stop_words(["the", "a"]))
///     .language("english")
///     .bm25(Bm25Params { k1: 1.5, ..Bm25Params::default() })
///     .build();
///
/// assert_eq!(db.count(), 0);
/// ```
pub struct DatabaseBuilder {
  schema: Schema,
  tokenizer: Option<Arc<dyn Tokenizer>>,
  language: Option<String>,
  bm25: Option<Bm25Params>,
  extensions: Vec<Box<dyn Extension>>,
}

impl DatabaseBuilder {
  /// Creates a builder for `schema`.
  pub fn new(schema: Schema) -> Self {
    Self {
      schema,
      tokenizer: None,
      language: None,
      bm25: None,
      extensions: Vec::new(),
    }
  }

  /// Sets the tokenizer used for documents and queries.
  ///
  /// If not set, [`DefaultTokenizer`] is used.
  pub fn tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
    self.tokenizer = Some(Arc::new(tokenizer));
    self
  }

  /// Sets the language passed to the tokenizer.
  pub fn language(mut self, language: impl Into<String>) -> Self {
    self.language = Some(language.into());
    self
  }

  /// Sets the BM25 parameters.
  pub fn bm25(mut self, params: Bm25Params) -> Self {
    self.bm25 = Some(params);
    self
  }

  /// Adds an extension. Hooks run in registration order.
  pub fn with_extension(mut self, extension: Box<dyn Extension>) -> Self {
    self.extensions.push(extension);
    self
  }

  /// Builds the `Database`.
  pub fn build(self) -> Database {
    let index = Index::new(&self.schema, self.bm25.unwrap_or_default());
    Database {
      schema: self.schema,
      id_store: InternalIdStore::new(),
      docs: DocumentsStore::new(),
      index,
      tokenizer: self
        .tokenizer
        .unwrap_or_else(|| Arc::new(DefaultTokenizer::new())),
      language: self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
      extensions: self.extensions,
    }
  }
}
