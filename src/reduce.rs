//! The Goodman reduction proper: turning every local subtree of a
//! plain/addressed tree pair into the full combinatorial set of rules.

use crate::error::{DopError, Result};
use crate::rules::{Production, Rule, Symbol};
use crate::tree::Tree;

/// Takes a list where each element is a set of choices, and returns all
/// the possible sequences generated, first position varying slowest.
/// Will clone the elements.
///
/// ```
/// let v = vec![
///   vec![1],
///   vec![2, 3],
///   vec![4, 5],
/// ];
///
/// assert_eq!(treedop::reduce::combinations(&v), vec![
///   vec![1, 2, 4],
///   vec![1, 2, 5],
///   vec![1, 3, 4],
///   vec![1, 3, 5],
/// ]);
/// ```
pub fn combinations<T>(choices: &[Vec<T>]) -> Vec<Vec<T>>
where
  T: Clone,
{
  let mut seqs: Vec<Vec<T>> = vec![Vec::with_capacity(choices.len())];
  for position in choices {
    let mut next = Vec::with_capacity(seqs.len() * position.len());
    for seq in seqs.iter() {
      for choice in position.iter() {
        let mut extended = seq.clone();
        extended.push(choice.clone());
        next.push(extended);
      }
    }
    seqs = next;
  }
  seqs
}

/// Emits every rule the reduction licenses for one tree and its addressed
/// twin. A node with `k` children yields exactly `2^(k+1)` rules: the lhs
/// and every child position choose between their plain and addressed
/// variant. A terminal child has no address, so both of its variants are
/// the same token; the duplicates are kept, because their multiplicity is
/// what makes the weights normalize.
///
/// Both trees are walked by the same traversal, so the nth local subtree
/// of the plain tree always pairs with the nth of the addressed one.
pub fn reduce_pair(plain: &Tree, addressed: &Tree) -> Result<Vec<Rule>> {
  let mut rules = Vec::new();
  reduce_node(plain, addressed, &mut rules)?;
  Ok(rules)
}

fn shape_mismatch(plain: &Tree, addressed: &Tree) -> DopError {
  DopError::MalformedTree(format!(
    "plain and addressed trees differ in shape: {} vs {}",
    plain, addressed
  ))
}

fn reduce_node(plain: &Tree, addressed: &Tree, out: &mut Vec<Rule>) -> Result<()> {
  match (plain, addressed) {
    (Tree::Leaf(_), Tree::Leaf(_)) => Ok(()),
    (Tree::Branch(plain_label, plain_children), Tree::Branch(addr_label, addr_children)) => {
      if plain_children.is_empty() {
        return Err(DopError::MalformedTree(format!(
          "node {} has no children",
          plain_label
        )));
      }
      if plain_children.len() != addr_children.len() {
        return Err(shape_mismatch(plain, addressed));
      }

      let mut child_choices: Vec<Vec<Production>> = Vec::with_capacity(plain_children.len());
      for (pc, ac) in plain_children.iter().zip(addr_children.iter()) {
        match (pc, ac) {
          (Tree::Leaf(token), Tree::Leaf(_)) => {
            // both the "plain" and the "addressed" pick of a terminal
            // position are the token itself
            let t = Production::Terminal(token.clone());
            child_choices.push(vec![t.clone(), t]);
          }
          (Tree::Branch(pl, _), Tree::Branch(al, _)) => {
            child_choices.push(vec![
              Production::Nonterminal(pl.clone()),
              Production::Nonterminal(al.clone()),
            ]);
          }
          _ => return Err(shape_mismatch(plain, addressed)),
        }
      }

      for rhs in combinations(&child_choices) {
        for lhs in [plain_label, addr_label] {
          out.push(Rule::new(lhs.clone(), rhs.clone()));
        }
      }

      for (pc, ac) in plain_children.iter().zip(addr_children.iter()) {
        reduce_node(pc, ac, out)?;
      }
      Ok(())
    }
    _ => Err(shape_mismatch(plain, addressed)),
  }
}
