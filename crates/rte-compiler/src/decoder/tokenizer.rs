//! Instruction tokenizer with source spans
//!
//! Splits one instruction's DSL text into tokens, keeping byte offsets so
//! the parser can report where decoding stopped.

use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, none_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair},
    IResult,
};
use rust_decimal::Decimal;

use crate::diagnostics::DiagnosticCode;

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(Decimal),
    String(String),
    // Keywords (case-insensitive)
    Set,
    If,
    Then,
    Else,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    // Punctuation
    LParen,
    RParen,
    Comma,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Set => write!(f, "Set"),
            TokenKind::If => write!(f, "If"),
            TokenKind::Then => write!(f, "Then"),
            TokenKind::Else => write!(f, "Else"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Le => write!(f, "<="),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Eof => write!(f, "end of instruction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {position}")]
pub struct TokenError {
    pub message: String,
    pub position: usize,
    pub code: DiagnosticCode,
}

/// Tokenize an entire instruction. The last token is always `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    loop {
        rest = rest.trim_start();
        let start = source.len() - rest.len();

        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
            return Ok(tokens);
        }

        match token(rest) {
            Ok((remaining, TokenKind::Number(_))) if number_overflows(rest, remaining) => {
                return Err(TokenError {
                    message: "number literal out of range".to_string(),
                    position: start,
                    code: DiagnosticCode::SyntaxError,
                });
            }
            Ok((remaining, kind)) => {
                let end = source.len() - remaining.len();
                tokens.push(Token {
                    kind,
                    span: Span::new(start, end),
                });
                rest = remaining;
            }
            Err(_) => return Err(lex_error(rest, start)),
        }
    }
}

fn lex_error(rest: &str, position: usize) -> TokenError {
    let found = rest.chars().next().unwrap_or(' ');
    if found == '"' {
        TokenError {
            message: "unterminated string literal".to_string(),
            position,
            code: DiagnosticCode::UnterminatedString,
        }
    } else {
        TokenError {
            message: format!("unexpected character '{}'", found),
            position,
            code: DiagnosticCode::SyntaxError,
        }
    }
}

// ============================================================================
// Lexemes
// ============================================================================

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((string_literal, number_literal, operator, word))(input)
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                none_of("\"\\"),
                '\\',
                alt((
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    value('\\', char('\\')),
                    value('"', char('"')),
                )),
            )),
            char('"'),
        ),
        |s: Option<String>| TokenKind::String(s.unwrap_or_default()),
    )(input)
}

/// Digits that do not fit a `Decimal` lex as `Number(0)`; `tokenize`
/// reports them through [`number_overflows`].
fn number_literal(input: &str) -> IResult<&str, TokenKind> {
    let (remaining, text) = number_text(input)?;
    let n = Decimal::from_str(text).unwrap_or_default();
    Ok((remaining, TokenKind::Number(n)))
}

fn number_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn number_overflows(input: &str, remaining: &str) -> bool {
    let text = &input[..input.len() - remaining.len()];
    Decimal::from_str(text).is_err()
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Ge, tag(">=")),
        value(TokenKind::Le, tag("<=")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::NotEq, tag("<>")),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Comma, char(',')),
    ))(input)
}

/// Identifiers and keywords. Variable names may carry a `~` marker and
/// dotted sub-indexes (`~PC_12.3`).
fn word(input: &str) -> IResult<&str, TokenKind> {
    let (remaining, text) = recognize(pair(
        alt((alpha1, tag("_"), tag("~"))),
        many0(alt((alphanumeric1, tag("_"), tag(".")))),
    ))(input)?;

    let kind = match text.to_ascii_lowercase().as_str() {
        "set" => TokenKind::Set,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        _ => TokenKind::Identifier(text.to_string()),
    };
    Ok((remaining, kind))
}
