//! Serializing a grammar into the rule and lexicon files the external
//! chart parser reads. This is the only module that touches the
//! filesystem on the grammar side.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{DopError, Result};
use crate::grammar::Grammar;
use crate::rules::{Rule, WeightedRule};

/// Writes the rule file (`weight<TAB>lhs<TAB>rhs1<TAB>rhs2...`) and the
/// lexicon file (`token<TAB>tag1 freq1<TAB>tag2 freq2...`).
///
/// Lexical rules are routed into the lexicon file's tag set implicitly
/// and never written as grammar rules; a rule with an empty rhs or an
/// empty symbol is refused before either file is touched, since a
/// malformed rule file corrupts the parser's grammar without any
/// parse-time symptom.
pub fn write_grammar(grammar: &Grammar, rules_path: &Path, lexicon_path: &Path) -> Result<()> {
  for wr in grammar.rules.iter() {
    check_exportable(&wr.rule)?;
  }

  let mut sorted: Vec<&WeightedRule> = grammar
    .rules
    .iter()
    .filter(|wr| !wr.rule.is_lexical())
    .collect();
  sorted.sort_by_key(|wr| (wr.rule.lhs.clone(), wr.rule.rhs.clone()));

  let mut rules = BufWriter::new(File::create(rules_path)?);
  for wr in sorted.iter() {
    write!(rules, "{}\t{}", wr.weight, wr.rule.lhs)?;
    for p in wr.rule.rhs.iter() {
      write!(rules, "\t{}", p)?;
    }
    writeln!(rules)?;
  }
  rules.flush()?;

  let mut lexicon = BufWriter::new(File::create(lexicon_path)?);
  for (token, tags) in grammar.lexicon.iter() {
    write!(lexicon, "{}", token)?;
    for (tag, count) in tags.iter() {
      write!(lexicon, "\t{} {}", tag, count)?;
    }
    writeln!(lexicon)?;
  }
  lexicon.flush()?;

  debug!(
    rules = sorted.len(),
    tokens = grammar.lexicon.len(),
    rules_file = %rules_path.display(),
    lexicon_file = %lexicon_path.display(),
    "wrote grammar"
  );
  Ok(())
}

fn check_exportable(rule: &Rule) -> Result<()> {
  if rule.is_empty() {
    return Err(DopError::EmptyRule(format!("{} -> <nothing>", rule.lhs)));
  }
  if rule.lhs.name.is_empty() || rule.rhs.iter().any(|p| p.symbol_str().is_empty()) {
    return Err(DopError::EmptyRule(format!(
      "empty symbol in rule {}",
      rule
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  use tempdir::TempDir;

  use crate::grammar::{ExportMode, ReductionOptions};
  use crate::parse_tree::parse_treebank;
  use crate::rules::{Production, Symbol, Weight};

  fn export(grammar: &Grammar) -> (String, String) {
    let dir = TempDir::new("treedop-test").unwrap();
    let rules = dir.path().join("g.pcfg");
    let lexicon = dir.path().join("g.lex");
    write_grammar(grammar, &rules, &lexicon).unwrap();
    (
      fs::read_to_string(&rules).unwrap(),
      fs::read_to_string(&lexicon).unwrap(),
    )
  }

  #[test]
  fn writes_bitpar_format() {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let g = Grammar::from_treebank(&treebank, &ReductionOptions::default()).unwrap();
    let (rules, lexicon) = export(&g);

    // only non-lexical rules, weight first, tab-separated
    let lines: Vec<&str> = rules.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines.contains(&"1\tS\tNP\tVP"));
    assert!(lines.contains(&"4\tS\tNP@1\tVP@2"));
    assert!(!rules.contains("mary"));

    assert!(lexicon.contains("mary\tNP 1\tNP@1 1"));
    assert!(lexicon.contains("walks\tVP 1\tVP@2 1"));
  }

  #[test]
  fn probability_mode_writes_floats() {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let opts = ReductionOptions {
      mode: ExportMode::Probabilities,
      ..ReductionOptions::default()
    };
    let g = Grammar::from_treebank(&treebank, &opts).unwrap();
    let (rules, _) = export(&g);
    assert!(rules.lines().any(|l| l.starts_with("0.1111111111111111\tS")));
  }

  #[test]
  fn refuses_empty_rules() {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let mut g = Grammar::from_treebank(&treebank, &ReductionOptions::default()).unwrap();
    g.rules.push(WeightedRule {
      rule: Rule::new(Symbol::plain("S"), vec![]),
      weight: Weight::Frequency(1u32.into()),
    });

    let dir = TempDir::new("treedop-test").unwrap();
    let rules_path = dir.path().join("g.pcfg");
    let err = write_grammar(&g, &rules_path, &dir.path().join("g.lex"));
    assert!(matches!(err, Err(DopError::EmptyRule(_))));
    // nothing was written
    assert!(!rules_path.exists());
  }

  #[test]
  fn refuses_empty_symbols() {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let mut g = Grammar::from_treebank(&treebank, &ReductionOptions::default()).unwrap();
    g.rules.push(WeightedRule {
      rule: Rule::new(
        Symbol::plain("S"),
        vec![Production::Terminal(String::new())],
      ),
      weight: Weight::Frequency(1u32.into()),
    });

    let dir = TempDir::new("treedop-test").unwrap();
    let err = write_grammar(
      &g,
      &dir.path().join("g.pcfg"),
      &dir.path().join("g.lex"),
    );
    assert!(matches!(err, Err(DopError::EmptyRule(_))));
  }
}
