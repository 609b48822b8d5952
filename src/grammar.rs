//! Building a weighted grammar from a treebank: decorate, count, reduce,
//! merge and weigh.

use std::collections::{BTreeMap, HashMap};

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use tracing::{debug, warn};

use crate::decorate::{decorate, AddressCounter};
use crate::error::Result;
use crate::freq::FreqTable;
use crate::reduce::reduce_pair;
use crate::rules::{Rule, Symbol, Weight, WeightedRule};
use crate::tree::Tree;

/// How rule weights are written: raw frequencies for parsers that smooth
/// and normalize themselves (bitpar does), or probabilities normalized
/// per left-hand side. Selected explicitly by the caller, never inferred
/// from the parser backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
  Frequencies,
  Probabilities,
}

#[derive(Debug, Clone)]
pub struct ReductionOptions {
  /// The grammar's designated root label.
  pub root: String,
  /// Wrap every treebank tree in the root label before reduction (used
  /// for morphology corpora whose trees have no common root).
  pub wrap: bool,
  pub mode: ExportMode,
}

impl Default for ReductionOptions {
  fn default() -> Self {
    Self {
      root: "S".to_string(),
      wrap: false,
      mode: ExportMode::Frequencies,
    }
  }
}

/// Tags a terminal can carry, with occurrence counts. Addressed tags show
/// up here too: the reduced grammar refers to them, so the lexicon has to
/// know them.
pub type LexiconEntry = BTreeMap<Symbol, u64>;

/// The complete reduced grammar: merged weighted rules, the lexicon, and
/// the root label. Built once from a treebank, immutable afterward.
#[derive(Debug)]
pub struct Grammar {
  pub start: String,
  pub mode: ExportMode,
  pub rules: Vec<WeightedRule>,
  pub lexicon: BTreeMap<String, LexiconEntry>,
}

impl Grammar {
  /// Runs the full Goodman reduction over a treebank.
  ///
  /// Per tree: repair pre-terminals, decorate with one shared address
  /// counter, count subtree frequencies for both the plain and addressed
  /// view, and emit the combinatorial rule set. Identical rules are
  /// merged with their occurrence counts summed, then weighed against
  /// the frequency table.
  pub fn from_treebank(treebank: &[Tree], opts: &ReductionOptions) -> Result<Grammar> {
    let mut counter = AddressCounter::new();
    let mut freq = FreqTable::new();
    let mut raw: HashMap<Rule, u64> = HashMap::new();
    let mut order: Vec<Rule> = Vec::new();
    let mut lexicon: BTreeMap<String, LexiconEntry> = BTreeMap::new();

    for tree in treebank {
      let tree = if opts.wrap {
        tree.clone().wrap(&opts.root)
      } else {
        tree.clone()
      };
      let tree = tree.ensure_preterminals();
      // a malformed tree aborts only itself, and is checked before it
      // can leave partial counts in the frequency table
      if let Err(e) = tree.check_wellformed() {
        warn!(error = %e, tree = %tree, "skipping malformed tree");
        continue;
      }
      let addressed = decorate(&tree, &mut counter);

      freq.count_tree(&tree)?;
      freq.count_tree(&addressed)?;
      collect_lexicon(&tree, &addressed, &mut lexicon);

      for rule in reduce_pair(&tree, &addressed)? {
        match raw.get_mut(&rule) {
          Some(count) => *count += 1,
          None => {
            raw.insert(rule.clone(), 1);
            order.push(rule);
          }
        }
      }
    }

    debug!(
      trees = treebank.len(),
      merged_rules = raw.len(),
      addresses = counter.issued(),
      "reduced treebank"
    );

    let mut rules = Vec::with_capacity(order.len());
    for rule in order {
      let count = raw[&rule];
      let weight = weigh(&rule, count, &freq, opts.mode);
      rules.push(WeightedRule { rule, weight });
    }

    Ok(Grammar {
      start: opts.root.clone(),
      mode: opts.mode,
      rules,
      lexicon,
    })
  }

  /// Total probability mass of the rules rewriting `lhs`. Only meaningful
  /// for probability-mode grammars.
  pub fn probability_mass(&self, lhs: &Symbol) -> f64 {
    self
      .rules
      .iter()
      .filter(|wr| wr.rule.lhs == *lhs)
      .filter_map(|wr| wr.weight.as_probability())
      .sum()
  }
}

/// A rule's weight is its merged occurrence count times the subtree
/// frequency of every addressed symbol on the rhs (plain symbols
/// contribute a factor of 1); the probability variant divides by the
/// lhs frequency, which makes the weights of all rules sharing an lhs
/// sum to exactly 1.
fn weigh(rule: &Rule, count: u64, freq: &FreqTable, mode: ExportMode) -> Weight {
  let mut numerator = BigUint::from(count);
  for symbol in rule.rhs_addressed() {
    numerator *= freq
      .get(symbol)
      .expect("addressed rhs symbol missing from frequency table");
  }
  match mode {
    ExportMode::Frequencies => Weight::Frequency(numerator),
    ExportMode::Probabilities => {
      let denominator = freq
        .get(&rule.lhs)
        .expect("lhs symbol missing from frequency table");
      Weight::Probability(ratio(&numerator, denominator))
    }
  }
}

fn ratio(numerator: &BigUint, denominator: &BigUint) -> f64 {
  let n = numerator.to_f64().unwrap_or(f64::INFINITY);
  let d = denominator.to_f64().unwrap_or(f64::INFINITY);
  if d == 0.0 { 0.0 } else { n / d }
}

/// Records every pre-terminal occurrence, under both its plain and its
/// addressed tag, walking the two views of the tree in lockstep.
fn collect_lexicon(plain: &Tree, addressed: &Tree, lexicon: &mut BTreeMap<String, LexiconEntry>) {
  if let (Tree::Branch(plain_label, plain_children), Tree::Branch(addr_label, addr_children)) =
    (plain, addressed)
  {
    if plain.is_preterminal() {
      if let Tree::Leaf(token) = &plain_children[0] {
        let entry = lexicon.entry(token.clone()).or_default();
        *entry.entry(plain_label.clone()).or_insert(0) += 1;
        *entry.entry(addr_label.clone()).or_insert(0) += 1;
      }
    } else {
      for (pc, ac) in plain_children.iter().zip(addr_children.iter()) {
        collect_lexicon(pc, ac, lexicon);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse_tree::parse_treebank;
  use crate::rules::Production;

  fn mary_walks(mode: ExportMode) -> Grammar {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let opts = ReductionOptions {
      mode,
      ..ReductionOptions::default()
    };
    Grammar::from_treebank(&treebank, &opts).unwrap()
  }

  fn probability_of(g: &Grammar, rule: &str) -> f64 {
    let (lhs, rhs) = rule.split_once(" -> ").unwrap();
    let rule = Rule::new(
      Symbol::parse(lhs),
      rhs
        .split(' ')
        .map(|s| {
          if s.chars().next().unwrap().is_lowercase() {
            Production::Terminal(s.to_string())
          } else {
            Production::Nonterminal(Symbol::parse(s))
          }
        })
        .collect(),
    );
    g.rules
      .iter()
      .find(|wr| wr.rule == rule)
      .and_then(|wr| wr.weight.as_probability())
      .unwrap()
  }

  #[test]
  fn mary_walks_probabilities() {
    let g = mary_walks(ExportMode::Probabilities);

    // the reference weights of the single-tree reduction
    assert!((probability_of(&g, "S -> NP VP") - 1.0 / 9.0).abs() < 1e-12);
    assert!((probability_of(&g, "S -> NP VP@2") - 2.0 / 9.0).abs() < 1e-12);
    assert!((probability_of(&g, "S -> NP@1 VP") - 2.0 / 9.0).abs() < 1e-12);
    assert!((probability_of(&g, "S -> NP@1 VP@2") - 4.0 / 9.0).abs() < 1e-12);
    assert!((probability_of(&g, "NP -> mary") - 1.0).abs() < 1e-12);
    assert!((probability_of(&g, "NP@1 -> mary") - 1.0).abs() < 1e-12);
    assert!((probability_of(&g, "VP -> walks") - 1.0).abs() < 1e-12);

    // collapsing addresses, all the mass of S sits on "S -> NP VP"
    let surface: f64 = g
      .rules
      .iter()
      .filter(|wr| wr.rule.lhs == Symbol::plain("S"))
      .filter_map(|wr| wr.weight.as_probability())
      .sum();
    assert!((surface - 1.0).abs() < 1e-12);
  }

  #[test]
  fn probabilities_sum_to_one_per_lhs() {
    let treebank = parse_treebank(
      "(S (NP John) (VP (V likes) (NP Mary)))\n\
       (S (NP Peter) (VP (V hates) (NP Susan)))\n\
       (S (NP Harry) (VP (V eats) (NP pizza)))",
    )
    .unwrap();
    let opts = ReductionOptions {
      mode: ExportMode::Probabilities,
      ..ReductionOptions::default()
    };
    let g = Grammar::from_treebank(&treebank, &opts).unwrap();

    let mut lhss: Vec<Symbol> = g.rules.iter().map(|wr| wr.rule.lhs.clone()).collect();
    lhss.sort();
    lhss.dedup();
    assert!(!lhss.is_empty());
    for lhs in lhss {
      let mass = g.probability_mass(&lhs);
      assert!(
        (mass - 1.0).abs() < 1e-9,
        "mass for {} was {}",
        lhs,
        mass
      );
    }
  }

  #[test]
  fn mary_walks_frequencies() {
    let g = mary_walks(ExportMode::Frequencies);

    let weight_of = |lhs: &str, rhs: Vec<Production>| {
      let rule = Rule::new(Symbol::parse(lhs), rhs);
      match &g.rules.iter().find(|wr| wr.rule == rule).unwrap().weight {
        Weight::Frequency(n) => n.clone(),
        Weight::Probability(_) => panic!("expected frequency weight"),
      }
    };

    let np = Production::Nonterminal(Symbol::plain("NP"));
    let np1 = Production::Nonterminal(Symbol::addressed("NP", 1));
    let vp2 = Production::Nonterminal(Symbol::addressed("VP", 2));

    assert_eq!(
      weight_of("S", vec![np.clone(), vp2.clone()]),
      BigUint::from(2u32)
    );
    assert_eq!(weight_of("S", vec![np1, vp2]), BigUint::from(4u32));
    assert_eq!(
      weight_of("NP", vec![Production::Terminal("mary".to_string())]),
      BigUint::from(2u32)
    );
  }

  #[test]
  fn lexicon_has_occurrence_counts() {
    let g = mary_walks(ExportMode::Frequencies);
    let mary = &g.lexicon["mary"];
    assert_eq!(mary[&Symbol::plain("NP")], 1);
    assert_eq!(mary[&Symbol::addressed("NP", 1)], 1);
    let walks = &g.lexicon["walks"];
    assert_eq!(walks[&Symbol::plain("VP")], 1);
  }

  #[test]
  fn wrap_adds_a_common_root() {
    let treebank = parse_treebank("(NP mary)").unwrap();
    let opts = ReductionOptions {
      root: "TOP".to_string(),
      wrap: true,
      mode: ExportMode::Probabilities,
    };
    let g = Grammar::from_treebank(&treebank, &opts).unwrap();
    assert!(g.rules.iter().any(|wr| wr.rule.lhs == Symbol::plain("TOP")));
    assert!((g.probability_mass(&Symbol::plain("TOP")) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn malformed_tree_skipped_without_aborting_the_batch() {
    let bad = Tree::Branch(Symbol::plain("S"), vec![]);
    let good: Tree = "(S (NP mary) (VP walks))".parse().unwrap();

    let opts = ReductionOptions {
      mode: ExportMode::Probabilities,
      ..ReductionOptions::default()
    };
    let g = Grammar::from_treebank(&[bad, good], &opts).unwrap();
    // the surviving tree still normalizes cleanly
    assert!((g.probability_mass(&Symbol::plain("S")) - 1.0).abs() < 1e-12);
  }
}
