use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use treedop::bitpar::BitParConfig;
use treedop::export::write_grammar;
use treedop::{
  parse_treebank, DopModel, ExportMode, Grammar, ParseOutcome, ReductionOptions, Result,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} TREEBANK [options]

Reads a treebank (one bracketed tree per line), builds the Goodman PCFG
reduction, and parses sentences from stdin with the external chart parser.

Options:
  -h, --help           Print this message
  -e, --export PREFIX  Write PREFIX.pcfg and PREFIX.lex, then exit
  -r, --root SYMBOL    Root label of the grammar (defaults to S)
  -w, --wrap           Wrap every tree in the root label
  -m, --mode MODE      Rule weights: freq (default) or prob
  -n, --nbest N        Derivations to request per sentence (default 10)
  -p, --parser PATH    External parser executable (default bitpar)
  -u, --unknown FILE   Unknown-word tag file passed to the parser
  -d, --dfsa FILE      Open-class word automaton passed to the parser
  -t, --timeout SECS   Kill the parser after SECS per invocation",
    prog_name
  )
}

struct Args {
  treebank: String,
  export: Option<String>,
  root: String,
  wrap: bool,
  mode: ExportMode,
  n_best: usize,
  parser: PathBuf,
  unknown_words: Option<PathBuf>,
  open_class_dfsa: Option<PathBuf>,
  timeout: Option<Duration>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> std::result::Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "treedop"));
    }

    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();

    let mut treebank: Option<String> = None;
    let mut export = None;
    let mut root = "S".to_string();
    let mut wrap = false;
    let mut mode = ExportMode::Frequencies;
    let mut n_best = 10;
    let mut parser = PathBuf::from("bitpar");
    let mut unknown_words = None;
    let mut open_class_dfsa = None;
    let mut timeout = None;

    let mut next_value = |iter: &mut std::vec::IntoIter<String>, opt: &str| {
      iter
        .next()
        .ok_or_else(|| Self::make_error_message(&format!("{} needs a value", opt), &prog_name))
    };

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-e" || o == "--export" {
        export = Some(next_value(&mut iter, &o)?);
      } else if o == "-r" || o == "--root" {
        root = next_value(&mut iter, &o)?;
      } else if o == "-w" || o == "--wrap" {
        wrap = true;
      } else if o == "-m" || o == "--mode" {
        mode = match next_value(&mut iter, &o)?.as_str() {
          "freq" => ExportMode::Frequencies,
          "prob" => ExportMode::Probabilities,
          other => {
            return Err(Self::make_error_message(
              &format!("unknown mode {}", other),
              &prog_name,
            ))
          }
        };
      } else if o == "-n" || o == "--nbest" {
        n_best = next_value(&mut iter, &o)?
          .parse()
          .map_err(|_| Self::make_error_message("nbest must be a number", &prog_name))?;
      } else if o == "-p" || o == "--parser" {
        parser = PathBuf::from(next_value(&mut iter, &o)?);
      } else if o == "-u" || o == "--unknown" {
        unknown_words = Some(PathBuf::from(next_value(&mut iter, &o)?));
      } else if o == "-d" || o == "--dfsa" {
        open_class_dfsa = Some(PathBuf::from(next_value(&mut iter, &o)?));
      } else if o == "-t" || o == "--timeout" {
        let secs: u64 = next_value(&mut iter, &o)?
          .parse()
          .map_err(|_| Self::make_error_message("timeout must be a number", &prog_name))?;
        timeout = Some(Duration::from_secs(secs));
      } else if treebank.is_none() {
        treebank = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", &prog_name));
      }
    }

    if let Some(treebank) = treebank {
      Ok(Self {
        treebank,
        export,
        root,
        wrap,
        mode,
        n_best,
        parser,
        unknown_words,
        open_class_dfsa,
        timeout,
      })
    } else {
      Err(Self::make_error_message("missing treebank file", prog_name))
    }
  }
}

fn repl(model: &mut DopModel) -> Result<()> {
  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(0) => return Ok(()), // ctrl+d
      Ok(_) => {
        let sentence: Vec<String> = input.split_whitespace().map(str::to_string).collect();
        if !sentence.is_empty() {
          match model.parse(&sentence) {
            Ok(ParseOutcome::Parsed { tree, weight }) => {
              println!("{} (p={})", tree, weight);
            }
            Ok(ParseOutcome::NoParse) => println!("No parse."),
            Err(e) => eprintln!("error: {}", e),
          }
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let text = fs::read_to_string(&opts.treebank)?;
  let treebank = parse_treebank(&text)?;
  let reduction = ReductionOptions {
    root: opts.root.clone(),
    wrap: opts.wrap,
    mode: opts.mode,
  };

  if let Some(prefix) = &opts.export {
    let grammar = Grammar::from_treebank(&treebank, &reduction)?;
    let rules = PathBuf::from(format!("{}.pcfg", prefix));
    let lexicon = PathBuf::from(format!("{}.lex", prefix));
    write_grammar(&grammar, &rules, &lexicon)?;
    println!("wrote {} and {}", rules.display(), lexicon.display());
    return Ok(());
  }

  let cfg = BitParConfig {
    executable: opts.parser.clone(),
    n_best: opts.n_best,
    unknown_words: opts.unknown_words.clone(),
    open_class_dfsa: opts.open_class_dfsa.clone(),
    timeout: opts.timeout,
  };
  let mut model = DopModel::new(&treebank, &reduction, cfg)?;
  repl(&mut model)
}
