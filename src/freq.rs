//! Subtree-frequency counting over plain and addressed trees.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::One;

use crate::error::{DopError, Result};
use crate::rules::Symbol;
use crate::tree::Tree;

/// Maps every label (plain or addressed; they share one namespace) to the
/// number of distinct subtrees headed by occurrences of that label across
/// the treebank.
///
/// Counts grow multiplicatively with tree size and branching, so they are
/// kept in arbitrary-precision integers; truncating them would silently
/// change rule weights downstream.
#[derive(Debug, Default)]
pub struct FreqTable {
  counts: HashMap<Symbol, BigUint>,
}

impl FreqTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, symbol: &Symbol) -> Option<&BigUint> {
    self.counts.get(symbol)
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  /// Counts one tree into the table. See [`FreqTable::count_tree_weighted`].
  pub fn count_tree(&mut self, tree: &Tree) -> Result<BigUint> {
    self.count_tree_weighted(tree, &BigUint::one())
  }

  /// Counts one tree into the table, with each leaf contributing
  /// `leaf_weight` instead of 1 (for merging pre-counted corpora).
  ///
  /// The number of subtrees headed by a node with children `c1..ck` is
  /// `Π (count(ci) + 1)`: each child can either stay an atomic frontier
  /// node or expand into any of its own counted subtrees. The node's
  /// label entry is *incremented* by that number, since a plain label
  /// recurs at many nodes. An addressed label occurs exactly once, so
  /// finding an existing entry for one means the decorator reused an
  /// address; that is always fatal.
  pub fn count_tree_weighted(&mut self, tree: &Tree, leaf_weight: &BigUint) -> Result<BigUint> {
    match tree {
      Tree::Leaf(token) => {
        self.add(Symbol::plain(token.clone()), leaf_weight.clone());
        Ok(leaf_weight.clone())
      }
      Tree::Branch(label, children) => {
        if children.is_empty() {
          return Err(DopError::MalformedTree(format!(
            "node {} has no children",
            label
          )));
        }
        let mut subtrees = BigUint::one();
        for child in children {
          subtrees *= self.count_tree_weighted(child, leaf_weight)? + BigUint::one();
        }
        if label.is_addressed() && self.counts.contains_key(label) {
          return Err(DopError::AddressCollision(label.to_string()));
        }
        self.add(label.clone(), subtrees.clone());
        Ok(subtrees)
      }
    }
  }

  fn add(&mut self, symbol: Symbol, count: BigUint) {
    *self.counts.entry(symbol).or_default() += count;
  }
}
