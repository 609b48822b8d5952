//! Recursive-descent reading of bracketed tree notation, as produced by
//! the treebank converter and by the external chart parser.

use regex::Regex;

use crate::error::{DopError, Result};
use crate::rules::Symbol;
use crate::tree::Tree;

type ParseResult<'a, T> = Result<(T, &'a str)>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

fn malformed(msg: String) -> DopError {
  DopError::MalformedTree(msg)
}

/// Try to consume a regex at the start of the input, returning None if it
/// doesn't match there
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> (Option<&'a str>, &'a str) {
  if let Some(m) = re.find(s) {
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> (Option<char>, &str) {
  let mut iter = s.char_indices().peekable();
  if let Some((_, c1)) = iter.next() {
    if c == c1 {
      let rest = if let Some((idx, _)) = iter.peek() {
        s.split_at(*idx).1
      } else {
        ""
      };
      return (Some(c), rest);
    }
  }
  (None, s)
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(malformed(format!("expected '{}' at {:?}", c, s)))
  }
}

fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE, r"\s+");
  optional_re(&WHITESPACE, s).1
}

/// A label or token: anything up to whitespace or a paren
fn parse_token(s: &str) -> ParseResult<&str> {
  regex_static!(TOKEN, r"[^\s()]+");
  if let (Some(t), rest) = optional_re(&TOKEN, s) {
    Ok((t, rest))
  } else {
    Err(malformed(format!("expected a label or token at {:?}", s)))
  }
}

/// `node := '(' label child* ')'`, where a child is a node or a bare token
fn parse_node(s: &str) -> ParseResult<Tree> {
  let (_, s) = needed_char('(', s)?;
  let s = skip_whitespace(s);
  let (label, s) = parse_token(s)?;
  let label = Symbol::parse(label);

  let mut children = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), rest) = optional_char(')', rem) {
      if children.is_empty() {
        return Err(malformed(format!("node {} has no children", label)));
      }
      return Ok((Tree::Branch(label, children), rest));
    }
    if rem.is_empty() {
      return Err(malformed(format!("unclosed node {}", label)));
    }
    let (child, rest) = if rem.starts_with('(') {
      parse_node(rem)?
    } else {
      let (token, rest) = parse_token(rem)?;
      (Tree::Leaf(token.to_string()), rest)
    };
    children.push(child);
    rem = rest;
  }
}

/// Parses one bracketed tree, requiring the whole input to be consumed.
pub fn parse_tree(s: &str) -> Result<Tree> {
  let s = skip_whitespace(s);
  let (tree, rest) = parse_node(s)?;
  let rest = skip_whitespace(rest);
  if rest.is_empty() {
    Ok(tree)
  } else {
    Err(malformed(format!("trailing input after tree: {:?}", rest)))
  }
}

/// Parses a treebank: one bracketed tree per non-empty line.
pub fn parse_treebank(s: &str) -> Result<Vec<Tree>> {
  s.lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(parse_tree)
    .collect()
}
