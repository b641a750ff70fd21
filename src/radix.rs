//! Compressed trie (radix tree) mapping tokens to postings.
//!
//! Nodes live in an arena and reference each other by index; the root is
//! always index 0 and holds the empty key. Released nodes go on a free list
//! and are reused by later inserts.
//!
//! Two invariants hold after every public operation:
//!
//! - a node other than the root that carries no postings has at least two
//!   children (chains of single-child nodes are merged into one fragment);
//! - the concatenated fragments from the root to a node with postings spell
//!   exactly one indexed token.

use crate::error::{Result, SiftError};
use crate::types::{InternalId, TermMode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Index of a node in the tree arena.
pub type NodeId = usize;

const ROOT: NodeId = 0;

/// Postings of a single token: internal document ID to term frequency.
pub type Postings = BTreeMap<InternalId, u32>;

#[derive(Debug, Clone, Default)]
struct Node {
  key: String,
  parent: Option<NodeId>,
  children: BTreeMap<char, NodeId>,
  postings: Postings,
}

impl Node {
  fn is_terminal(&self) -> bool {
    !self.postings.is_empty()
  }
}

/// How an indexed token matched a query term.
///
/// The derived ordering is the ranking tie-break: exact before prefix before
/// fuzzy, fuzzy by ascending distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
  /// The token equals the term.
  Exact,
  /// The token starts with the term.
  Prefix,
  /// The token is within `distance` edits of the term.
  Fuzzy {
    /// Levenshtein distance between token and term
    distance: u8,
  },
}

/// One indexed token returned by [`RadixTree::find`].
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatch<'a> {
  /// The full indexed token.
  pub token: String,
  /// How it matched.
  pub kind: MatchKind,
  /// Documents containing the token, with term frequencies.
  pub postings: &'a Postings,
}

/// A radix tree over the tokens of one text property.
///
/// # Examples
///
/// ```rust
/// use sift::radix::RadixTree;
/// use sift::types::TermMode;
///
/// let mut tree = RadixTree::new();
/// tree.insert("romane", 0, 1);
/// tree.insert("romanus", 1, 2);
///
/// assert!(tree.contains("romanus"));
/// assert!(!tree.contains("roman"));
///
/// let matches = tree.find("roman", TermMode::Prefix);
/// assert_eq!(matches.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RadixTree {
  nodes: Vec<Node>,
  free: Vec<NodeId>,
  tokens: usize,
}

impl Default for RadixTree {
  fn default() -> Self {
    Self::new()
  }
}

impl RadixTree {
  /// Creates an empty tree holding only the root.
  pub fn new() -> Self {
    Self {
      nodes: vec![Node::default()],
      free: Vec::new(),
      tokens: 0,
    }
  }

  /// Number of distinct tokens in the tree.
  pub fn len(&self) -> usize {
    self.tokens
  }

  /// Returns `true` if no token is indexed.
  pub fn is_empty(&self) -> bool {
    self.tokens == 0
  }

  /// Number of reachable nodes, root included.
  pub fn node_count(&self) -> usize {
    self.nodes.len() - self.free.len()
  }

  /// Adds `frequency` occurrences of `token` for document `id`.
  ///
  /// Empty tokens and zero frequencies are ignored.
  pub fn insert(&mut self, token: &str, id: InternalId, frequency: u32) {
    if token.is_empty() || frequency == 0 {
      return;
    }

    let mut current = ROOT;
    let mut rest = token;

    loop {
      let first = first_char(rest);
      let Some(child) = self.nodes[current].children.get(&first).copied() else {
        let leaf = self.alloc(Node {
          key: rest.to_string(),
          parent: Some(current),
          ..Node::default()
        });
        self.nodes[current].children.insert(first, leaf);
        self.add_posting(leaf, id, frequency);
        return;
      };

      let common = common_prefix_len(&self.nodes[child].key, rest);

      if common == self.nodes[child].key.len() {
        rest = &rest[common..];
        if rest.is_empty() {
          self.add_posting(child, id, frequency);
          return;
        }
        current = child;
        continue;
      }

      // Partial match: split the child at the mismatch point.
      let mid = self.split(current, child, common);
      rest = &rest[common..];

      if rest.is_empty() {
        self.add_posting(mid, id, frequency);
      } else {
        let leaf = self.alloc(Node {
          key: rest.to_string(),
          parent: Some(mid),
          ..Node::default()
        });
        self.nodes[mid].children.insert(first_char(rest), leaf);
        self.add_posting(leaf, id, frequency);
      }
      return;
    }
  }

  /// Returns `true` if exactly `token` is indexed.
  pub fn contains(&self, token: &str) -> bool {
    self.exact_node(token).is_some()
  }

  /// Postings of exactly `token`.
  pub fn postings(&self, token: &str) -> Option<&Postings> {
    self.exact_node(token).map(|id| &self.nodes[id].postings)
  }

  /// Number of documents containing exactly `token`.
  pub fn document_frequency(&self, token: &str) -> usize {
    self.postings(token).map_or(0, BTreeMap::len)
  }

  /// Finds indexed tokens matching `term`.
  ///
  /// Results are ordered by [`MatchKind`] and then by token. A term that is
  /// not fully consumed by the tree yields no exact or prefix match.
  pub fn find(&self, term: &str, mode: TermMode) -> Vec<TermMatch<'_>> {
    if term.is_empty() {
      return Vec::new();
    }

    let mut found: HashMap<NodeId, (String, MatchKind)> = HashMap::new();

    match mode {
      TermMode::Exact => {
        if let Some(id) = self.exact_node(term) {
          found.insert(id, (term.to_string(), MatchKind::Exact));
        }
      }
      TermMode::Prefix => self.collect_prefix(term, &mut found),
      TermMode::Fuzzy { tolerance } => {
        self.collect_prefix(term, &mut found);
        self.collect_fuzzy(term, tolerance, &mut found);
      }
    }

    let mut matches: Vec<TermMatch<'_>> = found
      .into_iter()
      .map(|(id, (token, kind))| TermMatch {
        token,
        kind,
        postings: &self.nodes[id].postings,
      })
      .collect();

    matches.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.token.cmp(&b.token)));
    matches
  }

  /// Removes the posting of document `id` from `token`.
  ///
  /// Returns `false` and leaves the tree untouched when there is nothing to
  /// remove, so repeated removal is a no-op.
  pub fn remove_document_by_word(&mut self, token: &str, id: InternalId) -> bool {
    let Some(node) = self.exact_node(token) else {
      return false;
    };

    if self.nodes[node].postings.remove(&id).is_none() {
      return false;
    }

    if self.nodes[node].postings.is_empty() {
      self.tokens -= 1;
      self.prune(node);
    }
    true
  }

  /// Removes document `id` from every token. Returns the number of tokens
  /// that lost a posting.
  pub fn remove_document(&mut self, id: InternalId) -> usize {
    let words: Vec<String> = self
      .terminals()
      .into_iter()
      .filter(|(_, node)| self.nodes[*node].postings.contains_key(&id))
      .map(|(word, _)| word)
      .collect();

    words
      .iter()
      .filter(|word| self.remove_document_by_word(word, id))
      .count()
  }

  /// Every indexed token in lexicographic order.
  pub fn tokens(&self) -> Vec<String> {
    self.terminals().into_iter().map(|(word, _)| word).collect()
  }

  /// Verifies the structural invariants of the tree.
  pub fn check_invariants(&self) -> std::result::Result<(), String> {
    let root = &self.nodes[ROOT];
    if !root.key.is_empty() || root.is_terminal() {
      return Err("root must have an empty key and no postings".to_string());
    }

    let mut terminals = 0;
    let mut reachable = 1;
    let mut stack = vec![ROOT];

    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];

      if id != ROOT {
        if node.key.is_empty() {
          return Err(format!("node {id} has an empty key"));
        }
        if !node.is_terminal() && node.children.len() < 2 {
          return Err(format!(
            "node {id} ('{}') is not terminal and has {} children",
            node.key,
            node.children.len()
          ));
        }
      }
      if node.is_terminal() {
        terminals += 1;
      }

      for (&first, &child) in &node.children {
        if first_char(&self.nodes[child].key) != first {
          return Err(format!("child {child} is filed under '{first}'"));
        }
        if self.nodes[child].parent != Some(id) {
          return Err(format!("child {child} does not point back to {id}"));
        }
        reachable += 1;
        stack.push(child);
      }
    }

    if terminals != self.tokens {
      return Err(format!(
        "token count {} disagrees with {terminals} terminal nodes",
        self.tokens
      ));
    }
    if reachable != self.node_count() {
      return Err(format!(
        "{reachable} reachable nodes but {} allocated",
        self.node_count()
      ));
    }
    Ok(())
  }

  /// Serializes the tree into its recursive node structure.
  pub fn to_snapshot(&self) -> NodeSnapshot {
    self.snapshot_node(ROOT, String::new())
  }

  /// Rebuilds a tree from a snapshot produced by [`RadixTree::to_snapshot`].
  ///
  /// The snapshot is validated first; a malformed one is rejected whole.
  pub fn from_snapshot(snapshot: &NodeSnapshot) -> Result<Self> {
    snapshot.validate()?;

    let mut tree = Self::new();
    for child in &snapshot.children {
      tree.restore_node(ROOT, child);
    }
    tree.tokens = snapshot.terminals().len();
    Ok(tree)
  }

  /// Inserts every posting of `snapshot` whose document ID `translate` maps
  /// to a local ID. Postings of untranslated documents are dropped.
  pub fn merge_snapshot<F>(&mut self, snapshot: &NodeSnapshot, translate: F) -> usize
  where
    F: Fn(InternalId) -> Option<InternalId>,
  {
    let mut merged = 0;
    for (word, postings) in snapshot.terminals() {
      for (&foreign, &frequency) in postings {
        if let Some(local) = translate(foreign) {
          self.insert(word, local, frequency);
          merged += 1;
        }
      }
    }
    merged
  }

  fn alloc(&mut self, node: Node) -> NodeId {
    match self.free.pop() {
      Some(id) => {
        self.nodes[id] = node;
        id
      }
      None => {
        self.nodes.push(node);
        self.nodes.len() - 1
      }
    }
  }

  fn add_posting(&mut self, node: NodeId, id: InternalId, frequency: u32) {
    let node = &mut self.nodes[node];
    if !node.is_terminal() {
      self.tokens += 1;
    }
    *node.postings.entry(id).or_insert(0) += frequency;
  }

  /// Splits `child` (a child of `parent`) after `at` bytes of its key and
  /// returns the new intermediate node.
  fn split(&mut self, parent: NodeId, child: NodeId, at: usize) -> NodeId {
    let key = std::mem::take(&mut self.nodes[child].key);
    let (head, tail) = key.split_at(at);

    let mid = self.alloc(Node {
      key: head.to_string(),
      parent: Some(parent),
      children: BTreeMap::from([(first_char(tail), child)]),
      postings: Postings::new(),
    });

    self.nodes[child].key = tail.to_string();
    self.nodes[child].parent = Some(mid);
    self.nodes[parent].children.insert(first_char(head), mid);
    mid
  }

  /// Restores the compression invariant at `id` after it lost its postings
  /// or a child.
  fn prune(&mut self, id: NodeId) {
    if id == ROOT || self.nodes[id].is_terminal() {
      return;
    }

    match self.nodes[id].children.len() {
      0 => {
        let node = std::mem::take(&mut self.nodes[id]);
        self.free.push(id);
        if let Some(parent) = node.parent {
          self.nodes[parent].children.remove(&first_char(&node.key));
          self.prune(parent);
        }
      }
      1 => self.merge_with_only_child(id),
      _ => {}
    }
  }

  fn merge_with_only_child(&mut self, id: NodeId) {
    let Some(&child) = self.nodes[id].children.values().next() else {
      return;
    };

    let absorbed = std::mem::take(&mut self.nodes[child]);
    self.free.push(child);

    for &grandchild in absorbed.children.values() {
      self.nodes[grandchild].parent = Some(id);
    }

    let node = &mut self.nodes[id];
    node.key.push_str(&absorbed.key);
    node.children = absorbed.children;
    node.postings = absorbed.postings;
  }

  fn exact_node(&self, token: &str) -> Option<NodeId> {
    match self.locate(token)? {
      (id, true) if self.nodes[id].is_terminal() => Some(id),
      _ => None,
    }
  }

  /// Walks down the tree consuming `term`. Returns the node reached and
  /// whether the term ended exactly on its boundary. When the term ends in
  /// the middle of a fragment, every token below that node has the term as a
  /// prefix.
  fn locate(&self, term: &str) -> Option<(NodeId, bool)> {
    let mut current = ROOT;
    let mut rest = term;

    while !rest.is_empty() {
      let child = *self.nodes[current].children.get(&first_char(rest))?;
      let key = self.nodes[child].key.as_str();

      if let Some(remaining) = rest.strip_prefix(key) {
        rest = remaining;
        current = child;
      } else if key.starts_with(rest) {
        return Some((child, false));
      } else {
        return None;
      }
    }

    Some((current, true))
  }

  /// Path string of `id`, reconstructed through parent links.
  fn path_of(&self, mut id: NodeId) -> String {
    let mut parts = Vec::new();
    while let Some(parent) = self.nodes[id].parent {
      parts.push(self.nodes[id].key.as_str());
      id = parent;
    }
    parts.iter().rev().copied().collect()
  }

  fn collect_prefix(&self, term: &str, found: &mut HashMap<NodeId, (String, MatchKind)>) {
    let Some((start, _)) = self.locate(term) else {
      return;
    };

    let mut stack = vec![(start, self.path_of(start))];
    while let Some((id, word)) = stack.pop() {
      let node = &self.nodes[id];
      if node.is_terminal() {
        let kind = if word == term {
          MatchKind::Exact
        } else {
          MatchKind::Prefix
        };
        found.insert(id, (word.clone(), kind));
      }
      for &child in node.children.values() {
        stack.push((child, format!("{word}{}", self.nodes[child].key)));
      }
    }
  }

  /// Bounded Levenshtein walk: one DP row per consumed character, branches
  /// whose best cell exceeds `tolerance` are cut.
  fn collect_fuzzy(
    &self,
    term: &str,
    tolerance: u8,
    found: &mut HashMap<NodeId, (String, MatchKind)>,
  ) {
    let term: Vec<char> = term.chars().collect();
    let first_row: Vec<usize> = (0..=term.len()).collect();
    let mut path = String::new();
    self.fuzzy_walk(ROOT, &term, &first_row, tolerance as usize, &mut path, found);
  }

  fn fuzzy_walk(
    &self,
    id: NodeId,
    term: &[char],
    row: &[usize],
    tolerance: usize,
    path: &mut String,
    found: &mut HashMap<NodeId, (String, MatchKind)>,
  ) {
    for &child in self.nodes[id].children.values() {
      let node = &self.nodes[child];
      let mut current = row.to_vec();
      let mut alive = true;

      for c in node.key.chars() {
        current = next_row(&current, term, c);
        if current.iter().min().copied().unwrap_or(usize::MAX) > tolerance {
          alive = false;
          break;
        }
      }
      if !alive {
        continue;
      }

      let len = path.len();
      path.push_str(&node.key);

      let distance = current[term.len()];
      if node.is_terminal() && distance <= tolerance {
        let kind = MatchKind::Fuzzy {
          distance: distance.min(u8::MAX as usize) as u8,
        };
        found
          .entry(child)
          .and_modify(|(_, existing)| *existing = (*existing).min(kind))
          .or_insert_with(|| (path.clone(), kind));
      }

      self.fuzzy_walk(child, term, &current, tolerance, path, found);
      path.truncate(len);
    }
  }

  /// Every terminal node with its token, in lexicographic order.
  fn terminals(&self) -> Vec<(String, NodeId)> {
    let mut out = Vec::with_capacity(self.tokens);
    let mut path = String::new();
    self.collect_terminals(ROOT, &mut path, &mut out);
    out
  }

  fn collect_terminals(&self, id: NodeId, path: &mut String, out: &mut Vec<(String, NodeId)>) {
    for &child in self.nodes[id].children.values() {
      let len = path.len();
      path.push_str(&self.nodes[child].key);
      if self.nodes[child].is_terminal() {
        out.push((path.clone(), child));
      }
      self.collect_terminals(child, path, out);
      path.truncate(len);
    }
  }

  fn snapshot_node(&self, id: NodeId, path: String) -> NodeSnapshot {
    let node = &self.nodes[id];
    let children = node
      .children
      .values()
      .map(|&child| self.snapshot_node(child, format!("{path}{}", self.nodes[child].key)))
      .collect();

    NodeSnapshot {
      key: node.key.clone(),
      word: node.is_terminal().then_some(path),
      postings: node.postings.clone(),
      children,
    }
  }

  fn restore_node(&mut self, parent: NodeId, snapshot: &NodeSnapshot) {
    let id = self.alloc(Node {
      key: snapshot.key.clone(),
      parent: Some(parent),
      children: BTreeMap::new(),
      postings: snapshot.postings.clone(),
    });
    self.nodes[parent].children.insert(first_char(&snapshot.key), id);

    for child in &snapshot.children {
      self.restore_node(id, child);
    }
  }
}

/// Serialized form of one radix tree node and its subtree.
///
/// `word` is the full token spelled by the path to this node and is present
/// exactly when the node carries postings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
  /// Key fragment of this node. Empty only at the root.
  pub key: String,
  /// Full token, for terminal nodes.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub word: Option<String>,
  /// Internal document ID to term frequency.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub postings: Postings,
  /// Children ordered by the first character of their key.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
  /// Checks the snapshot describes a well-formed compressed tree rooted here.
  pub fn validate(&self) -> Result<()> {
    if !self.key.is_empty() || self.word.is_some() || !self.postings.is_empty() {
      return Err(SiftError::malformed(
        "radix root must have an empty key and no postings",
      ));
    }
    self.validate_children(&mut String::new())
  }

  fn validate_children(&self, path: &mut String) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();

    for child in &self.children {
      if child.key.is_empty() {
        return Err(SiftError::malformed(format!(
          "empty key fragment below '{path}'"
        )));
      }
      if !seen.insert(first_char(&child.key)) {
        return Err(SiftError::malformed(format!(
          "two children of '{path}' start with '{}'",
          first_char(&child.key)
        )));
      }

      let len = path.len();
      path.push_str(&child.key);

      match &child.word {
        Some(word) if word != path.as_str() => {
          return Err(SiftError::malformed(format!(
            "node word '{word}' does not match its path '{path}'"
          )));
        }
        Some(_) if child.postings.is_empty() => {
          return Err(SiftError::malformed(format!(
            "terminal node '{path}' has no postings"
          )));
        }
        None if !child.postings.is_empty() => {
          return Err(SiftError::malformed(format!(
            "node '{path}' has postings but no word"
          )));
        }
        None if child.children.len() < 2 => {
          return Err(SiftError::malformed(format!(
            "non-terminal node '{path}' has {} children",
            child.children.len()
          )));
        }
        _ => {}
      }
      if child.postings.values().any(|&frequency| frequency == 0) {
        return Err(SiftError::malformed(format!(
          "zero term frequency under '{path}'"
        )));
      }

      child.validate_children(path)?;
      path.truncate(len);
    }
    Ok(())
  }

  /// Every terminal node's token and postings, depth first.
  pub fn terminals(&self) -> Vec<(&str, &Postings)> {
    let mut out = Vec::new();
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      if let Some(word) = &node.word {
        out.push((word.as_str(), &node.postings));
      }
      stack.extend(node.children.iter().rev());
    }
    out
  }
}

fn first_char(s: &str) -> char {
  s.chars().next().unwrap_or_default()
}

/// Length in bytes of the longest common prefix, on char boundaries.
fn common_prefix_len(a: &str, b: &str) -> usize {
  a.chars()
    .zip(b.chars())
    .take_while(|(x, y)| x == y)
    .map(|(x, _)| x.len_utf8())
    .sum()
}

fn next_row(prev: &[usize], term: &[char], c: char) -> Vec<usize> {
  let mut row = Vec::with_capacity(prev.len());
  row.push(prev[0] + 1);
  for j in 1..prev.len() {
    let cost = usize::from(term[j - 1] != c);
    let value = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
    row.push(value);
  }
  row
}
