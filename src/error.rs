//! The error taxonomy of the crate. The variants map onto failure
//! boundaries: a malformed tree aborts one tree, a collision or an empty
//! rule aborts the whole reduction, parser problems stay per sentence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DopError {
  /// A tree that cannot be reduced (zero-child node, bad bracketing).
  #[error("malformed tree: {0}")]
  MalformedTree(String),

  /// An address was issued twice. Addresses are meant to be unique per
  /// model, so this indicates a counter shared incorrectly.
  #[error("address collision: {0}")]
  AddressCollision(String),

  /// A rule with an empty rhs or an empty symbol, caught before it can
  /// reach an export file.
  #[error("refusing to export empty rule: {0}")]
  EmptyRule(String),

  /// The external parser produced no analysis for a sentence.
  #[error("no parse")]
  NoParse,

  /// The external parser could not be run, or its output could not be
  /// decoded.
  #[error("external parser failure: {0}")]
  ExternalProcessFailure(String),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DopError>;
