//! Text tokenization.
//!
//! The engine treats tokenization as a pure function supplied by the caller.
//! [`DefaultTokenizer`] splits on Unicode word boundaries and lower-cases.

use std::collections::{BTreeMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into normalized tokens.
///
/// Implementations must be deterministic: the same text and language always
/// produce the same tokens, otherwise removals cannot find what inserts added.
pub trait Tokenizer: Send + Sync {
  /// Tokenize `text` written in `language` into lower-cased tokens.
  ///
  /// Repeated tokens are kept; the index derives term frequencies from them.
  fn tokenize(&self, text: &str, language: &str) -> Vec<String>;
}

/// Unicode word tokenizer with optional stop words.
#[derive(Debug, Clone, Default)]
pub struct DefaultTokenizer {
  stop_words: HashSet<String>,
}

impl DefaultTokenizer {
  /// Create a tokenizer without stop words.
  pub fn new() -> Self {
    Self::default()
  }

  /// Drop the given words from every token stream.
  pub fn with_stop_words<I, S>(mut self, words: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self
      .stop_words
      .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    self
  }
}

impl Tokenizer for DefaultTokenizer {
  fn tokenize(&self, text: &str, _language: &str) -> Vec<String> {
    text
      .unicode_words()
      .map(|word| word.to_lowercase())
      .filter(|word| !self.stop_words.contains(word))
      .collect()
  }
}

/// Count occurrences of each token.
pub fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, u32> {
  let mut freqs = BTreeMap::new();

  for token in tokens {
    *freqs.entry(token.as_str()).or_insert(0) += 1;
  }

  freqs
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tokenize() {
    let tokens = DefaultTokenizer::new().tokenize("Hello, World! This is a test.", "english");
    assert_eq!(tokens, vec!["hello", "world", "this", "is", "a", "test"]);
  }

  #[test]
  fn test_tokenize_is_case_insensitive() {
    let tokenizer = DefaultTokenizer::new();
    assert_eq!(
      tokenizer.tokenize("JOHN", "english"),
      tokenizer.tokenize("john", "english")
    );
  }

  #[test]
  fn test_stop_words() {
    let tokenizer = DefaultTokenizer::new().with_stop_words(["The", "a"]);
    let tokens = tokenizer.tokenize("The quick fox and a dog", "english");
    assert_eq!(tokens, vec!["quick", "fox", "and", "dog"]);
  }

  #[test]
  fn test_term_frequencies() {
    let tokens = DefaultTokenizer::new().tokenize("the quick brown fox jumps over the lazy dog", "english");
    let freqs = term_frequencies(&tokens);
    assert_eq!(freqs.get("the"), Some(&2));
    assert_eq!(freqs.get("quick"), Some(&1));
    assert_eq!(freqs.get("cat"), None);
  }
}
