use std::fmt;

use num_bigint::BigUint;

/// A grammar symbol: a category name, optionally carrying the unique
/// node address assigned by the decorator. `NP` and `NP@7` share a name
/// but are distinct symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
  pub name: String,
  pub address: Option<usize>,
}

impl Symbol {
  pub fn plain(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      address: None,
    }
  }

  pub fn addressed(name: impl Into<String>, address: usize) -> Self {
    Self {
      name: name.into(),
      address: Some(address),
    }
  }

  pub fn is_addressed(&self) -> bool {
    self.address.is_some()
  }

  /// The same symbol with its address removed.
  pub fn stripped(&self) -> Self {
    Self::plain(self.name.clone())
  }

  /// Reads `NP@7` as an addressed symbol; anything without a trailing
  /// `@<number>` is plain. This is how the external parser's output gets
  /// its addresses back.
  pub fn parse(s: &str) -> Self {
    if let Some((name, addr)) = s.rsplit_once('@') {
      if !name.is_empty() {
        if let Ok(addr) = addr.parse::<usize>() {
          return Self::addressed(name, addr);
        }
      }
    }
    Self::plain(s)
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.address {
      Some(addr) => write!(f, "{}@{}", self.name, addr),
      None => write!(f, "{}", self.name),
    }
  }
}

/// One position on a rule's right-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Production {
  Terminal(String),
  Nonterminal(Symbol),
}

impl Production {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }

  pub fn is_nonterminal(&self) -> bool {
    matches!(self, Self::Nonterminal(_))
  }

  pub fn symbol(&self) -> Option<&Symbol> {
    match self {
      Self::Nonterminal(s) => Some(s),
      Self::Terminal(_) => None,
    }
  }

  pub fn symbol_str(&self) -> String {
    match self {
      Self::Terminal(s) => s.clone(),
      Self::Nonterminal(s) => s.to_string(),
    }
  }
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(s) => write!(f, "{}", s),
      Self::Nonterminal(s) => write!(f, "{}", s),
    }
  }
}

/// A context-free rule as emitted by the reduction. Identical rules from
/// different source trees compare equal and are merged by the weight
/// assigner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
  pub lhs: Symbol,
  pub rhs: Vec<Production>,
}

impl Rule {
  pub fn new(lhs: Symbol, rhs: Vec<Production>) -> Self {
    Self { lhs, rhs }
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// A lexical rule rewrites to a single terminal; these go to the
  /// lexicon file rather than the rule file.
  pub fn is_lexical(&self) -> bool {
    self.rhs.len() == 1 && self.rhs[0].is_terminal()
  }

  /// The addressed symbols on the right-hand side, which are the only
  /// ones contributing a frequency factor to the rule's weight.
  pub fn rhs_addressed(&self) -> impl Iterator<Item = &Symbol> {
    self
      .rhs
      .iter()
      .filter_map(|p| p.symbol())
      .filter(|s| s.is_addressed())
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.lhs)?;
    for p in self.rhs.iter() {
      write!(f, " {}", p)?;
    }
    Ok(())
  }
}

/// A rule weight: a raw frequency for export targets that normalize
/// themselves, or a normalized probability.
#[derive(Debug, Clone, PartialEq)]
pub enum Weight {
  Frequency(BigUint),
  Probability(f64),
}

impl Weight {
  pub fn as_probability(&self) -> Option<f64> {
    match self {
      Self::Probability(p) => Some(*p),
      Self::Frequency(_) => None,
    }
  }
}

impl fmt::Display for Weight {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Frequency(n) => write!(f, "{}", n),
      Self::Probability(p) => write!(f, "{}", p),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRule {
  pub rule: Rule,
  pub weight: Weight,
}

impl fmt::Display for WeightedRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.rule, self.weight)
  }
}

#[test]
fn test_symbol_roundtrip() {
  let s = Symbol::addressed("NP", 7);
  assert_eq!(s.to_string(), "NP@7");
  assert_eq!(Symbol::parse("NP@7"), s);
  assert_eq!(s.stripped(), Symbol::plain("NP"));

  // no numeric suffix means plain, even with an @ in the name
  assert_eq!(Symbol::parse("NP@x"), Symbol::plain("NP@x"));
  assert_eq!(Symbol::parse("VP"), Symbol::plain("VP"));
}

#[test]
fn test_rule_display_and_lexical() {
  let lexical = Rule::new(
    Symbol::plain("NP"),
    vec![Production::Terminal("mary".to_string())],
  );
  assert!(lexical.is_lexical());
  assert_eq!(lexical.to_string(), "NP -> mary");

  let binary = Rule::new(
    Symbol::plain("S"),
    vec![
      Production::Nonterminal(Symbol::plain("NP")),
      Production::Nonterminal(Symbol::addressed("VP", 2)),
    ],
  );
  assert!(!binary.is_lexical());
  assert_eq!(binary.to_string(), "S -> NP VP@2");
  assert_eq!(
    binary.rhs_addressed().collect::<Vec<_>>(),
    vec![&Symbol::addressed("VP", 2)]
  );
}
