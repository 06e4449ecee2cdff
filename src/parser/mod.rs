mod ast;
mod compile;
mod lexer;

// Re-export the public surface so callers only ever name `crate::parser::*`.
pub use ast::{Command, Direction, Pipeline};
pub use compile::{compile, CompileError, Compiled, RedirectPolicy};
pub use lexer::{tokenize, LexError, Limits};

use thiserror::Error;

/// Anything that stops a line from becoming a [`Pipeline`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

// ── Public API ────────────────────────────────────────────────────────────

/// Tokenize and compile one input line.
///
/// Returns `Ok(None)` if the line is empty or only whitespace.
pub fn parse_line(
    line: &str,
    limits: &Limits,
    policy: RedirectPolicy,
) -> Result<Option<Compiled>, ParseError> {
    let tokens = tokenize(line, limits)?;
    Ok(compile(&tokens, policy)?)
}

// ── Tests ──────────────────────────────────────────────────────────────────
