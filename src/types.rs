//! Core data types for the Sift search engine.

use crate::schema::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Type alias for caller-visible document identifiers.
///
/// Using a dedicated alias keeps signatures readable and makes it easy to swap
/// the underlying type later.
pub type ExternalId = String;

/// Engine-assigned compact document identifier.
///
/// Internal IDs double as positions in the documents store and as posting keys
/// in every radix tree, so they are never reused for a different document.
pub type InternalId = u32;

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
  /// The external ID of the matched document.
  pub id: ExternalId,
  /// The relevance score. Higher is better; an empty query scores every
  /// document at 0.0.
  pub score: f32,
  /// The original document as it was inserted.
  pub document: Document,
}

/// The outcome of a search: total match count plus one page of hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
  /// Number of matching documents before pagination.
  pub count: usize,
  /// The requested page of hits, best first.
  pub hits: Vec<SearchHit>,
  /// Wall time spent inside the engine.
  pub elapsed: Duration,
}

/// How a query token is matched against indexed tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TermMode {
  /// Only the identical token matches.
  Exact,
  /// Any indexed token starting with the query token matches.
  #[default]
  Prefix,
  /// Prefix matches plus any token within `tolerance` Levenshtein edits.
  Fuzzy {
    /// Maximum edit distance
    tolerance: u8,
  },
}

/// How per-token candidate sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolMode {
  /// A document matches if any query token matches.
  #[default]
  Or,
  /// A document matches only if every query token matches.
  And,
}

/// A full-text search request.
///
/// # Examples
///
/// ```rust
/// use sift::prelude::*;
///
/// let query = Query::builder()
///     .term("jane")
///     .properties(vec!["name".to_string()])
///     .options(SearchOptions::default().limit(5).exact())
///     .build();
///
/// assert_eq!(query.options.limit, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
  /// The text to search for. Tokenized with the instance tokenizer.
  #[serde(default)]
  pub term: String,
  /// String properties to search. `None` searches all of them.
  #[serde(default)]
  pub properties: Option<Vec<String>>,
  /// Matching, combination and pagination options.
  #[serde(default)]
  pub options: SearchOptions,
}

impl Query {
  /// Creates a new `QueryBuilder` to construct a `Query` in a chained manner.
  pub fn builder() -> QueryBuilder {
    QueryBuilder::default()
  }

  /// Shorthand for a query over all properties with default options.
  pub fn term(term: impl Into<String>) -> Self {
    Self {
      term: term.into(),
      ..Self::default()
    }
  }
}

/// A builder for creating `Query` instances.
#[derive(Debug, Default)]
pub struct QueryBuilder {
  term: String,
  properties: Option<Vec<String>>,
  options: SearchOptions,
}

impl QueryBuilder {
  /// Sets the query text.
  pub fn term(mut self, term: impl Into<String>) -> Self {
    self.term = term.into();
    self
  }

  /// Restricts the search to the given properties.
  pub fn properties(mut self, properties: Vec<String>) -> Self {
    self.properties = Some(properties);
    self
  }

  /// Sets the search options for the query.
  pub fn options(mut self, options: SearchOptions) -> Self {
    self.options = options;
    self
  }

  /// Builds the final `Query` object.
  pub fn build(self) -> Query {
    Query {
      term: self.term,
      properties: self.properties,
      options: self.options,
    }
  }
}

/// Options controlling a search operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
  /// The number of results to skip from the beginning of the ranked set.
  #[serde(default)]
  pub offset: usize,
  /// The maximum number of results to return.
  #[serde(default = "default_limit")]
  pub limit: usize,
  /// Token matching strategy.
  #[serde(default)]
  pub mode: TermMode,
  /// Candidate combination across query tokens.
  #[serde(default)]
  pub bool_mode: BoolMode,
  /// Per-property score multipliers. Properties not listed weigh 1.0.
  #[serde(default)]
  pub boost: HashMap<String, f32>,
}

fn default_limit() -> usize {
  10
}

impl Default for SearchOptions {
  fn default() -> Self {
    Self {
      offset: 0,
      limit: default_limit(),
      mode: TermMode::default(),
      bool_mode: BoolMode::default(),
      boost: HashMap::new(),
    }
  }
}

impl SearchOptions {
  /// Sets the `offset` value for pagination.
  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = offset;
    self
  }

  /// Sets the `limit` value for the maximum number of results.
  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// Sets the token matching strategy.
  pub fn mode(mut self, mode: TermMode) -> Self {
    self.mode = mode;
    self
  }

  /// Shorthand for `mode(TermMode::Exact)`.
  pub fn exact(self) -> Self {
    self.mode(TermMode::Exact)
  }

  /// Shorthand for `mode(TermMode::Fuzzy { tolerance })`.
  pub fn tolerance(self, tolerance: u8) -> Self {
    self.mode(TermMode::Fuzzy { tolerance })
  }

  /// Sets how candidates of different query tokens are combined.
  pub fn bool_mode(mut self, bool_mode: BoolMode) -> Self {
    self.bool_mode = bool_mode;
    self
  }

  /// Sets a score multiplier for one property.
  pub fn boost(mut self, property: impl Into<String>, weight: f32) -> Self {
    self.boost.insert(property.into(), weight);
    self
  }
}
