//! Tree decoration: assigning a globally unique address to every
//! non-terminal node, the first step of the Goodman reduction.

use crate::rules::Symbol;
use crate::tree::Tree;

/// Monotonic source of node addresses, threaded explicitly through one
/// reduction run and shared across the whole treebank so that no two
/// nodes anywhere receive the same address.
#[derive(Debug, Default)]
pub struct AddressCounter(usize);

impl AddressCounter {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_address(&mut self) -> usize {
    let addr = self.0;
    self.0 += 1;
    addr
  }

  /// How many addresses have been handed out so far.
  pub fn issued(&self) -> usize {
    self.0
  }
}

/// Builds the addressed twin of a tree: every non-terminal label gets the
/// next address, terminals are left untouched, shape and child order are
/// preserved exactly. Addresses are assigned in pre-order.
pub fn decorate(tree: &Tree, counter: &mut AddressCounter) -> Tree {
  match tree {
    Tree::Leaf(w) => Tree::Leaf(w.clone()),
    Tree::Branch(label, children) => {
      let label = Symbol::addressed(label.name.clone(), counter.next_address());
      let children = children.iter().map(|c| decorate(c, counter)).collect();
      Tree::Branch(label, children)
    }
  }
}
