use std::fmt;
use std::str::FromStr;

use crate::error::DopError;
use crate::parse_tree;
use crate::rules::Symbol;

/// A labeled ordered parse tree. Branch labels are symbols (plain or
/// addressed), leaves are terminal tokens.
///
/// Trees are never mutated in place: decoration, address stripping and
/// pre-terminal repair all build new nodes bottom-up, so a plain tree and
/// its addressed twin can never alias each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tree {
  Branch(Symbol, Vec<Tree>),
  Leaf(String),
}

impl Tree {
  pub fn branch(label: impl Into<String>, children: Vec<Tree>) -> Self {
    Self::Branch(Symbol::plain(label), children)
  }

  pub fn leaf(token: impl Into<String>) -> Self {
    Self::Leaf(token.into())
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn is_branch(&self) -> bool {
    matches!(self, Self::Branch(_, _))
  }

  pub fn get_branch(&self) -> Option<(&Symbol, &Vec<Tree>)> {
    match self {
      Self::Branch(s, cs) => Some((s, cs)),
      _ => None,
    }
  }

  /// A pre-terminal has exactly one child, and that child is a token.
  pub fn is_preterminal(&self) -> bool {
    match self {
      Self::Branch(_, cs) => cs.len() == 1 && cs[0].is_leaf(),
      Self::Leaf(_) => false,
    }
  }

  /// The terminal tokens, left to right.
  pub fn leaves(&self) -> Vec<&str> {
    fn walk<'a>(tree: &'a Tree, out: &mut Vec<&'a str>) {
      match tree {
        Tree::Leaf(w) => out.push(w),
        Tree::Branch(_, cs) => {
          for c in cs {
            walk(c, out);
          }
        }
      }
    }
    let mut out = Vec::new();
    walk(self, &mut out);
    out
  }

  /// A copy of this tree with every address removed.
  pub fn strip_addresses(&self) -> Tree {
    match self {
      Self::Leaf(w) => Self::Leaf(w.clone()),
      Self::Branch(label, children) => Self::Branch(
        label.stripped(),
        children.iter().map(|c| c.strip_addresses()).collect(),
      ),
    }
  }

  /// Wraps the tree in a fresh root node, e.g. to give every tree of a
  /// morphology corpus a common start symbol.
  pub fn wrap(self, root: &str) -> Tree {
    Self::Branch(Symbol::plain(root), vec![self])
  }

  /// Checks the structural precondition for reduction: no node may have
  /// zero children.
  pub fn check_wellformed(&self) -> crate::error::Result<()> {
    match self {
      Self::Leaf(_) => Ok(()),
      Self::Branch(label, children) => {
        if children.is_empty() {
          return Err(DopError::MalformedTree(format!(
            "node {} has no children",
            label
          )));
        }
        for c in children {
          c.check_wellformed()?;
        }
        Ok(())
      }
    }
  }

  /// Repairs trees where a token has siblings, so that every leaf's
  /// parent is a pre-terminal. A stray token under `NP` becomes
  /// `(NP_token token)`. Required before reduction, not optional.
  pub fn ensure_preterminals(&self) -> Tree {
    match self {
      Self::Leaf(w) => Self::Leaf(w.clone()),
      Self::Branch(label, children) if self.is_preterminal() => {
        Self::Branch(label.clone(), children.clone())
      }
      Self::Branch(label, children) => {
        let children = children
          .iter()
          .map(|c| match c {
            Self::Leaf(w) => Self::Branch(
              Symbol::plain(format!("{}_{}", label.name, w)),
              vec![Self::Leaf(w.clone())],
            ),
            branch => branch.ensure_preterminals(),
          })
          .collect();
        Self::Branch(label.clone(), children)
      }
    }
  }
}

impl fmt::Display for Tree {
  /// Single-line bracket notation: `(S (NP mary) (VP walks))`.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(w) => write!(f, "{}", w),
      Self::Branch(label, children) => {
        write!(f, "({}", label)?;
        for c in children.iter() {
          write!(f, " {}", c)?;
        }
        write!(f, ")")
      }
    }
  }
}

impl FromStr for Tree {
  type Err = DopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_tree::parse_tree(s)
  }
}

#[test]
fn test_display_parse_roundtrip() {
  let src = "(S (NP mary) (VP walks))";
  let tree: Tree = src.parse().unwrap();
  assert_eq!(tree.to_string(), src);
  assert_eq!(tree.leaves(), vec!["mary", "walks"]);
}

#[test]
fn test_strip_addresses() {
  let addressed: Tree = "(S@0 (NP@1 mary) (VP@2 walks))".parse().unwrap();
  let plain: Tree = "(S (NP mary) (VP walks))".parse().unwrap();
  assert_eq!(addressed.strip_addresses(), plain);
}

#[test]
fn test_ensure_preterminals_synthesizes_tags() {
  // "certe" sits directly under fcl next to non-terminal siblings
  let tree: Tree = "(fcl (adv certe) rapide)".parse().unwrap();
  let repaired = tree.ensure_preterminals();
  assert_eq!(repaired.to_string(), "(fcl (adv certe) (fcl_rapide rapide))");

  // already well-formed trees come back unchanged
  let good: Tree = "(S (NP mary) (VP walks))".parse().unwrap();
  assert_eq!(good.ensure_preterminals(), good);
}

#[test]
fn test_wrap() {
  let tree: Tree = "(NP mary)".parse().unwrap();
  assert_eq!(tree.wrap("TOP").to_string(), "(TOP (NP mary))");
}
