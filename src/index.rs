//! Per-property radix trees and candidate ranking.

use crate::error::{Result, SiftError};
use crate::radix::{NodeSnapshot, RadixTree, TermMatch};
use crate::schema::{lookup, Document, Schema};
use crate::scoring::{Bm25Params, TermStats};
use crate::tokenizer::{term_frequencies, Tokenizer};
use crate::types::{BoolMode, InternalId, TermMode};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The radix tree of one string property plus the field lengths BM25 needs.
///
/// The distinct tokens each document contributed are kept as well, so removal
/// drops exactly the postings that were added, whichever tokenizer produced
/// them.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
  tree: RadixTree,
  lengths: BTreeMap<InternalId, u32>,
  total_length: u64,
  terms: BTreeMap<InternalId, BTreeSet<String>>,
}

impl FieldIndex {
  /// The property's radix tree.
  pub fn tree(&self) -> &RadixTree {
    &self.tree
  }

  /// Token count of the property in document `id`.
  pub fn length(&self, id: InternalId) -> Option<u32> {
    self.lengths.get(&id).copied()
  }

  /// Per-document field lengths, by internal ID.
  pub fn lengths(&self) -> &BTreeMap<InternalId, u32> {
    &self.lengths
  }

  /// Mean token count over documents that have this property.
  pub fn average_length(&self) -> f32 {
    if self.lengths.is_empty() {
      0.0
    } else {
      self.total_length as f32 / self.lengths.len() as f32
    }
  }

  /// Distinct tokens indexed for document `id`.
  pub fn terms(&self, id: InternalId) -> Option<&BTreeSet<String>> {
    self.terms.get(&id)
  }

  fn add_text(&mut self, id: InternalId, text: &str, tokenizer: &dyn Tokenizer, language: &str) {
    let tokens = tokenizer.tokenize(text, language);
    let terms = self.terms.entry(id).or_default();
    for (token, frequency) in term_frequencies(&tokens) {
      self.tree.insert(token, id, frequency);
      terms.insert(token.to_string());
    }
    self.set_length(id, tokens.len() as u32);
  }

  fn remove(&mut self, id: InternalId) {
    for token in self.terms.remove(&id).unwrap_or_default() {
      self.tree.remove_document_by_word(&token, id);
    }
    self.clear_length(id);
  }

  fn set_length(&mut self, id: InternalId, length: u32) {
    if let Some(previous) = self.lengths.insert(id, length) {
      self.total_length -= u64::from(previous);
    }
    self.total_length += u64::from(length);
  }

  fn clear_length(&mut self, id: InternalId) {
    if let Some(previous) = self.lengths.remove(&id) {
      self.total_length -= u64::from(previous);
    }
  }
}

/// Ranking input shared by every property searched for one query.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams<'a> {
  /// Token matching strategy.
  pub mode: TermMode,
  /// How per-token candidate sets combine.
  pub bool_mode: BoolMode,
  /// Per-property score multipliers.
  pub boost: &'a HashMap<String, f32>,
  /// Live document count, for inverse document frequency.
  pub total_documents: usize,
}

/// Owns one radix tree per string property of the schema.
#[derive(Debug, Clone)]
pub struct Index {
  fields: BTreeMap<String, FieldIndex>,
  bm25: Bm25Params,
}

impl Index {
  /// Creates an empty index with one tree per string property of `schema`.
  pub fn new(schema: &Schema, bm25: Bm25Params) -> Self {
    let fields = schema
      .string_properties()
      .into_iter()
      .map(|path| (path, FieldIndex::default()))
      .collect();

    Self { fields, bm25 }
  }

  /// Names of the indexed properties, sorted.
  pub fn properties(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  /// The index of one property.
  pub fn field(&self, property: &str) -> Option<&FieldIndex> {
    self.fields.get(property)
  }

  /// Tokenizes every string property of `doc` and adds its postings under
  /// `id`. The document must already conform to the schema.
  pub fn insert_document(
    &mut self,
    id: InternalId,
    doc: &Document,
    tokenizer: &dyn Tokenizer,
    language: &str,
  ) {
    for (path, field) in self.fields.iter_mut() {
      if let Some(text) = lookup(doc, path).and_then(|value| value.as_str()) {
        field.add_text(id, text, tokenizer, language);
      }
    }
  }

  /// Indexes a single property of `doc` under `id`.
  pub(crate) fn insert_property(
    &mut self,
    property: &str,
    id: InternalId,
    doc: &Document,
    tokenizer: &dyn Tokenizer,
    language: &str,
  ) -> Result<()> {
    let field = self.fields.get_mut(property).ok_or_else(|| SiftError::UnknownField {
      field: property.to_string(),
    })?;
    if let Some(text) = lookup(doc, property).and_then(|value| value.as_str()) {
      field.add_text(id, text, tokenizer, language);
    }
    Ok(())
  }

  /// Removes every posting of `id` from every property, along with its field
  /// lengths.
  pub fn remove_document(&mut self, id: InternalId) {
    for field in self.fields.values_mut() {
      field.remove(id);
    }
  }

  /// Looks up one query token in one property.
  pub fn search_field(&self, property: &str, term: &str, mode: TermMode) -> Result<Vec<TermMatch<'_>>> {
    let field = self.fields.get(property).ok_or_else(|| SiftError::UnknownField {
      field: property.to_string(),
    })?;
    Ok(field.tree.find(term, mode))
  }

  /// Scores every document matching `tokens` in `properties`.
  ///
  /// Returns `(internal ID, score)` pairs, best first; equal scores are
  /// ordered by ascending internal ID.
  pub fn search(
    &self,
    tokens: &[String],
    properties: &[String],
    params: &SearchParams<'_>,
  ) -> Result<Vec<(InternalId, f32)>> {
    for property in properties {
      if !self.fields.contains_key(property) {
        return Err(SiftError::UnknownField {
          field: property.clone(),
        });
      }
    }

    let mut seen = HashSet::new();
    let per_token: Vec<HashMap<InternalId, f32>> = tokens
      .iter()
      .filter(|token| seen.insert(token.as_str()))
      .map(|token| self.score_token(token, properties, params))
      .collect();

    let combined = match params.bool_mode {
      BoolMode::Or => union(per_token),
      BoolMode::And => intersection(per_token),
    };

    let mut ranked: Vec<(InternalId, f32)> = combined.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(ranked)
  }

  fn score_token(
    &self,
    token: &str,
    properties: &[String],
    params: &SearchParams<'_>,
  ) -> HashMap<InternalId, f32> {
    #[cfg(feature = "parallel")]
    let per_field: Vec<HashMap<InternalId, f32>> = properties
      .par_iter()
      .map(|property| self.score_field(property, token, params))
      .collect();

    #[cfg(not(feature = "parallel"))]
    let per_field: Vec<HashMap<InternalId, f32>> = properties
      .iter()
      .map(|property| self.score_field(property, token, params))
      .collect();

    union(per_field)
  }

  fn score_field(&self, property: &str, token: &str, params: &SearchParams<'_>) -> HashMap<InternalId, f32> {
    let mut scores = HashMap::new();
    let Some(field) = self.fields.get(property) else {
      return scores;
    };

    let boost = params.boost.get(property).copied().unwrap_or(1.0);
    let average_field_length = field.average_length();

    for matched in field.tree.find(token, params.mode) {
      let document_frequency = matched.postings.len();
      for (&id, &term_frequency) in matched.postings {
        let stats = TermStats {
          term_frequency,
          field_length: field.length(id).unwrap_or(term_frequency),
          average_field_length,
          document_frequency,
          total_documents: params.total_documents,
        };
        *scores.entry(id).or_insert(0.0) += self.bm25.score(&stats) * boost;
      }
    }
    scores
  }

  /// Merges a foreign property tree and its field lengths, translating
  /// document IDs. Entries whose ID does not translate are dropped.
  pub(crate) fn merge_field<F>(
    &mut self,
    property: &str,
    tree: &NodeSnapshot,
    lengths: &BTreeMap<InternalId, u32>,
    translate: F,
  ) -> Result<usize>
  where
    F: Fn(InternalId) -> Option<InternalId>,
  {
    let field = self.fields.get_mut(property).ok_or_else(|| SiftError::UnknownField {
      field: property.to_string(),
    })?;

    for (&foreign, &length) in lengths {
      if let Some(local) = translate(foreign) {
        field.set_length(local, length);
      }
    }
    for (word, postings) in tree.terminals() {
      for &foreign in postings.keys() {
        if let Some(local) = translate(foreign) {
          field.terms.entry(local).or_default().insert(word.to_string());
        }
      }
    }
    Ok(field.tree.merge_snapshot(tree, translate))
  }
}

fn union(maps: Vec<HashMap<InternalId, f32>>) -> HashMap<InternalId, f32> {
  let mut out: HashMap<InternalId, f32> = HashMap::new();
  for map in maps {
    for (id, score) in map {
      *out.entry(id).or_insert(0.0) += score;
    }
  }
  out
}

fn intersection(maps: Vec<HashMap<InternalId, f32>>) -> HashMap<InternalId, f32> {
  let mut maps = maps.into_iter();
  let Some(mut out) = maps.next() else {
    return HashMap::new();
  };

  for map in maps {
    out.retain(|id, _| map.contains_key(id));
    for (id, score) in out.iter_mut() {
      *score += map[id];
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::Value;
  use crate::tokenizer::DefaultTokenizer;

  fn index_with(docs: &[&str]) -> Index {
    let schema = Schema::builder().string("body").build();
    let mut index = Index::new(&schema, Bm25Params::default());
    for (id, body) in docs.iter().enumerate() {
      let doc = Document::from([("body".to_string(), Value::from(*body))]);
      index.insert_document(id as InternalId, &doc, &DefaultTokenizer::new(), "english");
    }
    index
  }

  fn params(bool_mode: BoolMode, boost: &HashMap<String, f32>, total: usize) -> SearchParams<'_> {
    SearchParams {
      mode: TermMode::Exact,
      bool_mode,
      boost,
      total_documents: total,
    }
  }

  fn ids(ranked: &[(InternalId, f32)]) -> Vec<InternalId> {
    ranked.iter().map(|(id, _)| *id).collect()
  }

  #[test]
  fn test_or_and_and() {
    let index = index_with(&["red fox", "red dog", "blue fox"]);
    let boost = HashMap::new();
    let tokens = vec!["red".to_string(), "fox".to_string()];
    let properties = vec!["body".to_string()];

    let or = index.search(&tokens, &properties, &params(BoolMode::Or, &boost, 3)).unwrap();
    assert_eq!(or.len(), 3);
    assert_eq!(or[0].0, 0);

    let and = index.search(&tokens, &properties, &params(BoolMode::And, &boost, 3)).unwrap();
    assert_eq!(ids(&and), vec![0]);
  }

  #[test]
  fn test_ties_break_by_internal_id() {
    let index = index_with(&["fox", "fox", "fox"]);
    let boost = HashMap::new();
    let ranked = index
      .search(&["fox".to_string()], &["body".to_string()], &params(BoolMode::Or, &boost, 3))
      .unwrap();
    assert_eq!(ids(&ranked), vec![0, 1, 2]);
  }

  #[test]
  fn test_term_frequency_ranks_higher() {
    let index = index_with(&["fox dog cat", "fox fox fox"]);
    let boost = HashMap::new();
    let ranked = index
      .search(&["fox".to_string()], &["body".to_string()], &params(BoolMode::Or, &boost, 2))
      .unwrap();
    assert_eq!(ids(&ranked), vec![1, 0]);
  }

  #[test]
  fn test_unknown_property() {
    let index = index_with(&["fox"]);
    let boost = HashMap::new();
    let err = index
      .search(&["fox".to_string()], &["title".to_string()], &params(BoolMode::Or, &boost, 1))
      .unwrap_err();
    assert!(matches!(err, SiftError::UnknownField { field } if field == "title"));
    assert!(index.search_field("title", "fox", TermMode::Exact).is_err());
  }

  #[test]
  fn test_remove_document_clears_postings_and_lengths() {
    let mut index = index_with(&["red fox", "red dog"]);
    index.remove_document(0);

    let field = index.field("body").unwrap();
    assert!(!field.tree().contains("fox"));
    assert_eq!(field.tree().document_frequency("red"), 1);
    assert_eq!(field.length(0), None);
    assert_eq!(field.average_length(), 2.0);
  }

  #[test]
  fn test_search_field_prefix() {
    let index = index_with(&["paolo", "paola", "michele"]);
    let matches = index.search_field("body", "pao", TermMode::Prefix).unwrap();
    assert_eq!(matches.len(), 2);
  }

  #[test]
  fn test_merged_postings_are_removed_without_retokenizing() {
    let source = index_with(&["the fox"]);
    let snapshot = source.field("body").unwrap().tree().to_snapshot();
    let lengths = source.field("body").unwrap().lengths().clone();

    let mut target = index_with(&[]);
    target
      .merge_field("body", &snapshot, &lengths, |foreign| Some(foreign + 5))
      .unwrap();
    assert_eq!(
      target.field("body").unwrap().terms(5).map(|terms| terms.len()),
      Some(2)
    );

    target.remove_document(5);
    let field = target.field("body").unwrap();
    assert!(field.tree().is_empty());
    assert_eq!(field.terms(5), None);
    assert_eq!(field.length(5), None);
  }
}
