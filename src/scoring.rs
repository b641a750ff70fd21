//! An implementation of the Okapi BM25 scoring algorithm.
//!
//! BM25 (Best Matching 25) estimates how relevant a document field is to a
//! query token from the token's frequency in the field, the field's length
//! and how rare the token is across the corpus.

use serde::{Deserialize, Serialize};

/// BM25 configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
  /// Term frequency saturation. Higher values let repeated occurrences keep
  /// adding to the score for longer.
  pub k1: f32,
  /// Field length normalization, from 0.0 (none) to 1.0 (full).
  pub b: f32,
  /// Lower bound added to the normalized term frequency (BM25+), so a match
  /// in a very long field still scores above zero.
  pub d: f32,
}

impl Default for Bm25Params {
  fn default() -> Self {
    Self {
      k1: 1.2,
      b: 0.75,
      d: 0.5,
    }
  }
}

/// Statistics for scoring one token in one document field.
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
  /// Occurrences of the token in the field.
  pub term_frequency: u32,
  /// Number of tokens in the field.
  pub field_length: u32,
  /// Average field length across live documents.
  pub average_field_length: f32,
  /// Number of live documents whose field contains the token.
  pub document_frequency: usize,
  /// Number of live documents.
  pub total_documents: usize,
}

impl Bm25Params {
  /// Calculates the BM25 score of one token in one field.
  pub fn score(&self, stats: &TermStats) -> f32 {
    let tf = stats.term_frequency as f32;
    if tf == 0.0 {
      return 0.0;
    }

    let idf = idf(stats.document_frequency as f32, stats.total_documents);
    let average = if stats.average_field_length > 0.0 {
      stats.average_field_length
    } else {
      1.0
    };
    let length_ratio = stats.field_length as f32 / average;

    idf * (self.d + tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * length_ratio))
  }
}

/// Inverse document frequency. Always positive, so every match scores.
fn idf(document_frequency: f32, total_documents: usize) -> f32 {
  let n = total_documents as f32;
  (1.0 + (n - document_frequency + 0.5) / (document_frequency + 0.5)).ln()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stats(tf: u32, len: u32, df: usize) -> TermStats {
    TermStats {
      term_frequency: tf,
      field_length: len,
      average_field_length: 4.0,
      document_frequency: df,
      total_documents: 10,
    }
  }

  #[test]
  fn test_bm25_scoring() {
    let params = Bm25Params::default();
    assert!(params.score(&stats(1, 4, 3)) > 0.0);
    assert_eq!(params.score(&stats(0, 4, 3)), 0.0);
  }

  #[test]
  fn test_rare_terms_score_higher() {
    let params = Bm25Params::default();
    assert!(params.score(&stats(1, 4, 1)) > params.score(&stats(1, 4, 9)));
  }

  #[test]
  fn test_shorter_fields_score_higher() {
    let params = Bm25Params::default();
    assert!(params.score(&stats(1, 2, 3)) > params.score(&stats(1, 8, 3)));
  }

  #[test]
  fn test_frequency_raises_score() {
    let params = Bm25Params::default();
    assert!(params.score(&stats(3, 4, 3)) > params.score(&stats(1, 4, 3)));
  }

  #[test]
  fn test_idf_stays_positive_for_ubiquitous_terms() {
    assert!(idf(10.0, 10) > 0.0);
  }
}
