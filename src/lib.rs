#[macro_use]
extern crate lazy_static;

pub mod bitpar;
pub mod cache;
pub mod decorate;
pub mod disambiguate;
pub mod error;
pub mod export;
pub mod freq;
pub mod grammar;
pub mod parse_tree;
pub mod reduce;
pub mod rules;
pub mod tree;

use tracing::{debug, warn};

use crate::bitpar::{BitParConfig, BitParParser, NBest};
use crate::cache::ParseCache;
pub use crate::disambiguate::{most_probable_parse, ParseOutcome};
pub use crate::error::{DopError, Result};
pub use crate::grammar::{ExportMode, Grammar, ReductionOptions};
pub use crate::parse_tree::parse_treebank;
pub use crate::tree::Tree;

/// A DOP model over a treebank: the Goodman-reduced grammar, a running
/// session of the external chart parser, and a memo table of previously
/// parsed sentences.
pub struct DopModel {
  grammar: Grammar,
  parser: BitParParser,
  cache: ParseCache,
}

impl DopModel {
  pub fn new(treebank: &[Tree], opts: &ReductionOptions, cfg: BitParConfig) -> Result<Self> {
    let grammar = Grammar::from_treebank(treebank, opts)?;
    let parser = BitParParser::new(&grammar, cfg)?;
    Ok(Self {
      grammar,
      parser,
      cache: ParseCache::new(),
    })
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  /// Parses one sentence and returns its most probable parse, memoized
  /// per token sequence.
  pub fn parse(&mut self, sentence: &[String]) -> Result<ParseOutcome> {
    if let Some(hit) = self.cache.get(sentence) {
      debug!("cache hit");
      return Ok(hit.clone());
    }
    let outcome = match self.parser.nbest(sentence)? {
      NBest::Parses(candidates) => most_probable_parse(&candidates),
      NBest::NoParse => ParseOutcome::NoParse,
    };
    self.cache.insert(sentence.to_vec(), outcome.clone());
    Ok(outcome)
  }

  /// Parses a batch of sentences in one external-parser invocation.
  /// A sentence that fails (no parse, or undecodable output) never
  /// aborts the batch; a batch where *every* sentence fails is surfaced
  /// as a configuration problem.
  pub fn parse_batch(&mut self, sentences: &[Vec<String>]) -> Result<Vec<ParseOutcome>> {
    let mut outcomes: Vec<Option<ParseOutcome>> = sentences
      .iter()
      .map(|s| self.cache.get(s).cloned())
      .collect();

    let misses: Vec<usize> = outcomes
      .iter()
      .enumerate()
      .filter(|(_, o)| o.is_none())
      .map(|(i, _)| i)
      .collect();

    if !misses.is_empty() {
      let sents: Vec<Vec<String>> = misses.iter().map(|&i| sentences[i].clone()).collect();
      let results = self.parser.batch(&sents)?;

      let failures = results.iter().filter(|r| r.is_err()).count();
      if failures > 0 && failures == results.len() {
        return Err(DopError::ExternalProcessFailure(
          "every sentence in the batch failed; check the parser configuration".to_string(),
        ));
      }

      for (&i, result) in misses.iter().zip(results) {
        let outcome = match result {
          Ok(NBest::Parses(candidates)) => {
            let outcome = most_probable_parse(&candidates);
            self.cache.insert(sentences[i].clone(), outcome.clone());
            outcome
          }
          Ok(NBest::NoParse) => {
            self.cache.insert(sentences[i].clone(), ParseOutcome::NoParse);
            ParseOutcome::NoParse
          }
          Err(e) => {
            // transient failure: reported as no analysis, but not memoized
            warn!(error = %e, sentence = i, "sentence failed, reporting no parse");
            ParseOutcome::NoParse
          }
        };
        outcomes[i] = Some(outcome);
      }
    }

    Ok(
      outcomes
        .into_iter()
        .map(|o| o.expect("every outcome filled"))
        .collect(),
    )
  }

  pub fn clear_cache(&mut self) {
    self.cache.clear();
  }
}

#[test]
fn test_reduction_to_disambiguation_pipeline() {
  // everything except the external binary itself: reduce a treebank,
  // decode a canned n-best stream in its output format, disambiguate
  let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
  let opts = ReductionOptions {
    mode: ExportMode::Probabilities,
    ..ReductionOptions::default()
  };
  let g = Grammar::from_treebank(&treebank, &opts).unwrap();
  assert_eq!(g.start, "S");

  let output = "vitprob=0.444444\n(S@0 (NP@1 mary) (VP@2 walks))\n\
                vitprob=0.222222\n(S@0 (NP@1 mary) (VP walks))\n\
                vitprob=0.222222\n(S@0 (NP mary) (VP@2 walks))\n\
                vitprob=0.111111\n(S@0 (NP mary) (VP walks))\n\n";
  let mut results = bitpar::decode_output(output, 1).unwrap();
  let candidates = match results.pop().unwrap().unwrap() {
    NBest::Parses(c) => c,
    NBest::NoParse => panic!("expected parses"),
  };

  match most_probable_parse(&candidates) {
    ParseOutcome::Parsed { tree, weight } => {
      assert_eq!(tree.to_string(), "(S (NP mary) (VP walks))");
      // all four derivations collapse onto the one surface parse
      assert!((weight - 0.999999).abs() < 1e-6);
    }
    ParseOutcome::NoParse => panic!("expected a parse"),
  }
}

#[test]
fn test_batch_survives_failed_sentences() {
  // one parse, one genuine no-parse, one undecodable block
  let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
  let dir = tempdir::TempDir::new("treedop-test").unwrap();
  let stub = bitpar::stub_parser(
    &dir,
    "#!/bin/sh\n\
     printf 'vitprob=0.4\\n(S@0 (NP@1 mary) (VP@2 walks))\\n\\nNo parse for: \"x\"\\n\\nvitprob=bad\\nbad\\n\\n'\n",
  );
  let cfg = BitParConfig {
    executable: stub.clone(),
    ..BitParConfig::default()
  };
  let mut model =
    DopModel::new(&treebank, &ReductionOptions::default(), cfg).unwrap();

  let sentences = vec![
    vec!["mary".to_string(), "walks".to_string()],
    vec!["x".to_string()],
    vec!["y".to_string()],
  ];
  let outcomes = model.parse_batch(&sentences).unwrap();
  assert_eq!(outcomes.len(), 3);
  match &outcomes[0] {
    ParseOutcome::Parsed { tree, weight } => {
      assert_eq!(tree.to_string(), "(S (NP mary) (VP walks))");
      assert!((weight - 0.4).abs() < 1e-12);
    }
    ParseOutcome::NoParse => panic!("expected a parse"),
  }
  assert_eq!(outcomes[1], ParseOutcome::NoParse);
  assert_eq!(outcomes[2], ParseOutcome::NoParse);

  // the parse and the genuine no-parse are memoized: re-running them
  // against a now-broken parser never reaches it
  std::fs::write(&stub, "#!/bin/sh\nexit 1\n").unwrap();
  let cached = model.parse_batch(&sentences[..2]).unwrap();
  assert_eq!(cached[0], outcomes[0]);
  assert_eq!(cached[1], ParseOutcome::NoParse);

  // the undecodable sentence was not memoized, so it hits the parser
  // again and surfaces its failure
  assert!(model.parse(&sentences[2]).is_err());
}

#[test]
fn test_all_failed_batch_is_a_configuration_error() {
  let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
  let dir = tempdir::TempDir::new("treedop-test").unwrap();
  let stub = bitpar::stub_parser(
    &dir,
    "#!/bin/sh\nprintf 'vitprob=bad\\nbad\\n\\nvitprob=bad\\nbad\\n\\n'\n",
  );
  let cfg = BitParConfig {
    executable: stub,
    ..BitParConfig::default()
  };
  let mut model =
    DopModel::new(&treebank, &ReductionOptions::default(), cfg).unwrap();

  let sentences = vec![vec!["x".to_string()], vec!["y".to_string()]];
  let err = model.parse_batch(&sentences).unwrap_err();
  assert!(matches!(err, DopError::ExternalProcessFailure(_)));
}
