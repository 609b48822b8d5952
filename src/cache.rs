//! Exact-key memoization of parse results per sentence.

use std::collections::HashMap;

use crate::disambiguate::ParseOutcome;

/// Maps a token sequence to its most recently computed outcome, so a
/// repeated sentence never re-invokes the external parser. No eviction;
/// cleared only explicitly.
#[derive(Debug, Default)]
pub struct ParseCache {
  entries: HashMap<Vec<String>, ParseOutcome>,
}

impl ParseCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, sentence: &[String]) -> Option<&ParseOutcome> {
    self.entries.get(sentence)
  }

  pub fn insert(&mut self, sentence: Vec<String>, outcome: ParseOutcome) {
    self.entries.insert(sentence, outcome);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tree::Tree;

  fn sentence(s: &str) -> Vec<String> {
    s.split(' ').map(str::to_string).collect()
  }

  #[test]
  fn stores_and_clears() {
    let mut cache = ParseCache::new();
    let tree: Tree = "(S (NP mary) (VP walks))".parse().unwrap();
    let outcome = ParseOutcome::Parsed { tree, weight: 0.5 };

    assert!(cache.get(&sentence("mary walks")).is_none());
    cache.insert(sentence("mary walks"), outcome.clone());
    cache.insert(sentence("sue walks"), ParseOutcome::NoParse);

    assert_eq!(cache.get(&sentence("mary walks")), Some(&outcome));
    assert_eq!(cache.get(&sentence("sue walks")), Some(&ParseOutcome::NoParse));
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
  }
}
