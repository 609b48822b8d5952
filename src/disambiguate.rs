//! Most-probable-parse approximation over the external parser's n-best
//! derivations.
//!
//! The reduction turns one DOP derivation into many distinct addressed
//! PCFG derivations, so the most probable *parse* has to marginalize over
//! every derivation that shares a surface tree. Doing that exactly is
//! intractable; this marginalizes over just the n best derivations the
//! parser returned.

use crate::error::{DopError, Result};
use crate::tree::Tree;

/// The disambiguated result for one sentence. "No analysis" is an
/// explicit outcome, never a degenerate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
  Parsed { tree: Tree, weight: f64 },
  NoParse,
}

impl ParseOutcome {
  pub fn tree(&self) -> Option<&Tree> {
    match self {
      Self::Parsed { tree, .. } => Some(tree),
      Self::NoParse => None,
    }
  }

  /// The parse tree, for callers that treat a missing analysis as an
  /// error rather than an outcome.
  pub fn into_tree(self) -> Result<Tree> {
    match self {
      Self::Parsed { tree, .. } => Ok(tree),
      Self::NoParse => Err(DopError::NoParse),
    }
  }
}

/// Strips every candidate's addresses, merges candidates that become
/// structurally identical by summing their weights, and returns the
/// heaviest equivalence class. Ties go to the class encountered first.
pub fn most_probable_parse(candidates: &[(f64, Tree)]) -> ParseOutcome {
  let mut classes: Vec<(Tree, f64)> = Vec::new();
  for (weight, tree) in candidates {
    let stripped = tree.strip_addresses();
    match classes.iter_mut().find(|(t, _)| *t == stripped) {
      Some((_, total)) => *total += weight,
      None => classes.push((stripped, *weight)),
    }
  }

  let mut best: Option<(Tree, f64)> = None;
  for (tree, weight) in classes {
    // strict comparison keeps the first-encountered class on ties
    if best.as_ref().map(|(_, w)| weight > *w).unwrap_or(true) {
      best = Some((tree, weight));
    }
  }

  match best {
    Some((tree, weight)) => ParseOutcome::Parsed { tree, weight },
    None => ParseOutcome::NoParse,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merged_class_beats_single_heavier_candidate() {
    // two derivations of the same surface parse at 0.3 each outweigh a
    // distinct parse at 0.5
    let a1: Tree = "(S@0 (NP@1 mary) (VP@2 walks))".parse().unwrap();
    let a2: Tree = "(S@0 (NP mary) (VP@2 walks))".parse().unwrap();
    let b: Tree = "(S@0 (NP (N mary)) (VP@2 walks))".parse().unwrap();

    let outcome = most_probable_parse(&[(0.5, b), (0.3, a1), (0.3, a2)]);
    match outcome {
      ParseOutcome::Parsed { tree, weight } => {
        assert_eq!(tree.to_string(), "(S (NP mary) (VP walks))");
        assert!((weight - 0.6).abs() < 1e-12);
      }
      ParseOutcome::NoParse => panic!("expected a parse"),
    }
  }

  #[test]
  fn idempotent_on_a_single_stripped_candidate() {
    let tree: Tree = "(S (NP mary) (VP walks))".parse().unwrap();
    let outcome = most_probable_parse(&[(0.25, tree.clone())]);
    assert_eq!(
      outcome,
      ParseOutcome::Parsed {
        tree,
        weight: 0.25
      }
    );
  }

  #[test]
  fn ties_go_to_the_first_candidate() {
    let a: Tree = "(S (A x))".parse().unwrap();
    let b: Tree = "(S (B x))".parse().unwrap();
    let outcome = most_probable_parse(&[(0.5, a.clone()), (0.5, b)]);
    assert_eq!(outcome.tree(), Some(&a));
  }

  #[test]
  fn no_candidates_is_no_parse() {
    let outcome = most_probable_parse(&[]);
    assert_eq!(outcome, ParseOutcome::NoParse);
    assert!(matches!(outcome.into_tree(), Err(DopError::NoParse)));
  }
}
