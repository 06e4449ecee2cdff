use nom::{
    bytes::complete::is_not,
    character::complete::multispace0,
    multi::many0,
    sequence::terminated,
    IResult,
    Parser,
};
use thiserror::Error;

/// Bounds applied to every input line before it is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_line_length: usize,
    pub max_token_count: usize,
}

impl Default for Limits {
    /// 100 characters per line, 51 tokens per line.
    fn default() -> Self {
        Limits { max_line_length: 100, max_token_count: 51 }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("line is longer than {max} characters ({len})")]
    LineTooLong { len: usize, max: usize },
    #[error("line contains more than {max} tokens")]
    TooManyTokens { max: usize },
}

// ── nom parsers ────────────────────────────────────────────────────────────

fn word(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n")(input)
}

fn words(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, _) = multispace0(input)?;
    many0(terminated(word, multispace0)).parse(input)
}

// ── Public API ────────────────────────────────────────────────────────────

/// Split `line` into whitespace-delimited tokens, left to right.
///
/// A single trailing newline is not counted against the length bound. An
/// empty or all-whitespace line yields an empty vector.
pub fn tokenize<'a>(line: &'a str, limits: &Limits) -> Result<Vec<&'a str>, LexError> {
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);

    let len = line.chars().count();
    if len > limits.max_line_length {
        return Err(LexError::LineTooLong { len, max: limits.max_line_length });
    }

    // `words` accepts every input: whatever is not whitespace is a word.
    let tokens = words(line).map(|(_, tokens)| tokens).unwrap_or_default();
    if tokens.len() > limits.max_token_count {
        return Err(LexError::TooManyTokens { max: limits.max_token_count });
    }
    Ok(tokens)
}
