//! Shell interface to bitpar, an efficient chart parser for (P)CFGs.
//! Expects the binary to be available on the PATH (or pointed at through
//! [`BitParConfig::executable`]). The grammar is handed over as a rule
//! file and a lexicon file; sentences go in one token per line with a
//! blank line after each sentence, and come back as blocks of
//! `vitprob=...` / bracketed-tree line pairs.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{DopError, Result};
use crate::export::write_grammar;
use crate::grammar::Grammar;
use crate::tree::Tree;

/// The n-best result for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum NBest {
  /// Ranked `(weight, addressed tree)` candidates, best first.
  Parses(Vec<(f64, Tree)>),
  NoParse,
}

#[derive(Debug, Clone)]
pub struct BitParConfig {
  pub executable: PathBuf,
  /// How many parses to request per sentence (`-b`). The disambiguator
  /// marginalizes over these, so more is more accurate.
  pub n_best: usize,
  /// Open-class tags with frequencies for unknown words (`-u`).
  pub unknown_words: Option<PathBuf>,
  /// Deterministic automaton over open-class words (`-w`).
  pub open_class_dfsa: Option<PathBuf>,
  /// Kill the parser process after this long; the affected sentences
  /// come back as failed slots, like any other transient problem.
  pub timeout: Option<Duration>,
}

impl Default for BitParConfig {
  fn default() -> Self {
    Self {
      executable: PathBuf::from("bitpar"),
      n_best: 10,
      unknown_words: None,
      open_class_dfsa: None,
      timeout: None,
    }
  }
}

/// One parsing session: the grammar files live in a temp directory for
/// the session's lifetime and every call is a fresh batch invocation of
/// the external binary.
#[derive(Debug)]
pub struct BitParParser {
  cfg: BitParConfig,
  start: String,
  dir: tempdir::TempDir,
  rules_path: PathBuf,
  lexicon_path: PathBuf,
}

impl BitParParser {
  pub fn new(grammar: &Grammar, cfg: BitParConfig) -> Result<Self> {
    let dir = tempdir::TempDir::new("treedop")?;
    let rules_path = dir.path().join("g.pcfg");
    let lexicon_path = dir.path().join("g.lex");
    write_grammar(grammar, &rules_path, &lexicon_path)?;
    Ok(Self {
      cfg,
      start: grammar.start.clone(),
      dir,
      rules_path,
      lexicon_path,
    })
  }

  pub fn nbest(&self, sentence: &[String]) -> Result<NBest> {
    let mut results = self.batch(&[sentence.to_vec()])?;
    results
      .pop()
      .unwrap_or_else(|| Err(DopError::ExternalProcessFailure("empty batch".to_string())))
  }

  /// Parses a batch of sentences in one invocation. Per-sentence failures
  /// (undecodable output) come back as `Err` slots without aborting the
  /// batch; only spawn-level problems fail the whole call.
  pub fn batch(&self, sentences: &[Vec<String>]) -> Result<Vec<Result<NBest>>> {
    if sentences.is_empty() {
      return Ok(Vec::new());
    }

    let input_path = self.dir.path().join("input");
    let output_path = self.dir.path().join("output");
    let stderr_path = self.dir.path().join("stderr");

    let mut input = String::new();
    for sentence in sentences {
      for token in sentence {
        input.push_str(token);
        input.push('\n');
      }
      input.push('\n');
    }
    fs::write(&input_path, input)?;

    // quiet, n best parses, viterbi probabilities, frequency input
    let mut cmd = Command::new(&self.cfg.executable);
    cmd
      .arg("-q")
      .arg("-b")
      .arg(self.cfg.n_best.to_string())
      .arg("-vp")
      .arg("-p")
      .arg("-s")
      .arg(&self.start);
    if let Some(unknown) = &self.cfg.unknown_words {
      cmd.arg("-u").arg(unknown);
    }
    if let Some(dfsa) = &self.cfg.open_class_dfsa {
      cmd.arg("-w").arg(dfsa);
    }
    cmd
      .arg(&self.rules_path)
      .arg(&self.lexicon_path)
      .arg(&input_path)
      .stdin(Stdio::null())
      .stdout(File::create(&output_path)?)
      .stderr(File::create(&stderr_path)?);

    debug!(sentences = sentences.len(), "invoking external parser");
    let mut child = cmd.spawn().map_err(|e| {
      DopError::ExternalProcessFailure(format!(
        "could not spawn {}: {}",
        self.cfg.executable.display(),
        e
      ))
    })?;

    if !self.wait(&mut child)? {
      // a timeout is transient, so it gets the same per-sentence Err
      // slots as undecodable output and is never memoized upstream
      warn!("external parser timed out, failing every sentence in the batch");
      return Ok(
        (0..sentences.len())
          .map(|_| {
            Err(DopError::ExternalProcessFailure(
              "external parser timed out".to_string(),
            ))
          })
          .collect(),
      );
    }

    let output = fs::read_to_string(&output_path)?;
    decode_output(&output, sentences.len()).map_err(|e| {
      let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
      DopError::ExternalProcessFailure(format!("{} (stderr: {})", e, stderr.trim()))
    })
  }

  /// Waits for the child, honoring the configured timeout. Returns false
  /// if the child had to be killed.
  fn wait(&self, child: &mut std::process::Child) -> Result<bool> {
    let deadline = self.cfg.timeout.map(|t| Instant::now() + t);
    loop {
      if let Some(status) = child.try_wait()? {
        if !status.success() {
          return Err(DopError::ExternalProcessFailure(format!(
            "external parser exited with {}",
            status
          )));
        }
        return Ok(true);
      }
      if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
          child.kill().ok();
          child.wait().ok();
          return Ok(false);
        }
      }
      thread::sleep(Duration::from_millis(20));
    }
  }
}

/// Splits the parser's output stream into per-sentence blocks and decodes
/// each one. The block count must match the sentence count; inside a
/// block, failures are recorded per sentence so the rest of the batch
/// survives.
pub fn decode_output(output: &str, n_sentences: usize) -> Result<Vec<Result<NBest>>> {
  let blocks: Vec<&str> = output
    .split("\n\n")
    .map(str::trim)
    .filter(|b| !b.is_empty())
    .collect();
  if blocks.len() != n_sentences {
    return Err(DopError::ExternalProcessFailure(format!(
      "expected {} result blocks, got {}",
      n_sentences,
      blocks.len()
    )));
  }
  Ok(blocks.into_iter().map(decode_block).collect())
}

fn decode_block(block: &str) -> Result<NBest> {
  if block.contains("No parse") {
    return Ok(NBest::NoParse);
  }

  let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
  if lines.is_empty() || lines.len() % 2 != 0 {
    return Err(DopError::ExternalProcessFailure(format!(
      "undecodable result block: {:?}",
      block
    )));
  }

  let mut parses = Vec::with_capacity(lines.len() / 2);
  for pair in lines.chunks(2) {
    let weight = pair[0]
      .split('=')
      .nth(1)
      .and_then(|w| w.trim().parse::<f64>().ok())
      .ok_or_else(|| {
        DopError::ExternalProcessFailure(format!("undecodable weight line: {:?}", pair[0]))
      })?;
    let tree: Tree = unescape(pair[1]).parse().map_err(|e| {
      DopError::ExternalProcessFailure(format!("undecodable tree line: {}", e))
    })?;
    parses.push((weight, tree));
  }
  Ok(NBest::Parses(parses))
}

/// bitpar escapes some tree characters with backslashes; undo that.
fn unescape(s: &str) -> String {
  lazy_static! {
    static ref ESCAPED: Regex = Regex::new(r"\\([/{}\[\]<>'$])").unwrap();
  }
  ESCAPED.replace_all(s, "$1").into_owned()
}

/// Writes an executable shell script standing in for the external
/// parser. Its stdout lands in the session's output file, so a fixed
/// `printf` is enough to script any batch result.
#[cfg(test)]
pub(crate) fn stub_parser(dir: &tempdir::TempDir, script: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;
  let path = dir.path().join("stub-parser");
  fs::write(&path, script).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::{Grammar, ReductionOptions};
  use crate::parse_tree::parse_treebank;

  #[test]
  fn decodes_nbest_blocks() {
    let output = "vitprob=0.444444\n(S@0 (NP@1 mary) (VP@2 walks))\n\
                  vitprob=0.222222\n(S@0 (NP mary) (VP@2 walks))\n\n\
                  No parse for: \"colorless green ideas\"\n\n";
    let results = decode_output(output, 2).unwrap();
    assert_eq!(results.len(), 2);

    match results[0].as_ref().unwrap() {
      NBest::Parses(parses) => {
        assert_eq!(parses.len(), 2);
        assert!((parses[0].0 - 0.444444).abs() < 1e-9);
        assert_eq!(parses[0].1.to_string(), "(S@0 (NP@1 mary) (VP@2 walks))");
      }
      NBest::NoParse => panic!("expected parses"),
    }
    assert_eq!(*results[1].as_ref().unwrap(), NBest::NoParse);
  }

  #[test]
  fn per_sentence_failure_leaves_batch_intact() {
    let output = "vitprob=garbage\nnot a tree\n\n\
                  vitprob=1.0\n(S@0 (NP@1 mary) (VP@2 walks))\n\n";
    let results = decode_output(output, 2).unwrap();
    assert!(results[0].is_err());
    assert!(results[1].is_ok());
  }

  #[test]
  fn block_count_mismatch_is_a_batch_failure() {
    assert!(matches!(
      decode_output("vitprob=1.0\n(S x)\n\n", 2),
      Err(DopError::ExternalProcessFailure(_))
    ));
  }

  #[test]
  fn timed_out_batch_fails_every_sentence() {
    let treebank = parse_treebank("(S (NP mary) (VP walks))").unwrap();
    let g = Grammar::from_treebank(&treebank, &ReductionOptions::default()).unwrap();

    let dir = tempdir::TempDir::new("treedop-test").unwrap();
    let stub = stub_parser(&dir, "#!/bin/sh\nsleep 5\n");
    let cfg = BitParConfig {
      executable: stub,
      timeout: Some(Duration::from_millis(50)),
      ..BitParConfig::default()
    };
    let parser = BitParParser::new(&g, cfg).unwrap();

    let results = parser
      .batch(&[vec!["mary".to_string()], vec!["walks".to_string()]])
      .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results
      .iter()
      .all(|r| matches!(r, Err(DopError::ExternalProcessFailure(_)))));
  }

  #[test]
  fn undoes_bitpar_escaping() {
    assert_eq!(unescape(r"(S (N a\/b) (V c\'d))"), "(S (N a/b) (V c'd))");
    assert_eq!(unescape("(S (N plain))"), "(S (N plain))");
  }
}
