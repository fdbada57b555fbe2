use std::fmt::Display;

use crate::token::Token;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorMsg {
    // Lex errors
    UnexpectedChar,
    UnterminatedString,
    OddHexDigits,
    InvalidNumber,
    // Parse errors
    UnexpectedToken,
    ExpectedExpression,
    ExpectedIdent,
    ExpectedEndOfStatement,
    MissingOpeningBrace,
    MissingClosingBrace,
    MissingClosingParen,
    MissingClosingBracket,
    MissingColon,
    MissingIn,
    InvalidAssignment,
    InvalidDefer,
    InvalidCase,
    DefaultNotLast,
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnexpectedChar => "unexpected character",
            Self::UnterminatedString => "unterminated string",
            Self::OddHexDigits => "odd number of hex digits in byte string",
            Self::InvalidNumber => "invalid number literal",
            Self::UnexpectedToken => "unexpected token",
            Self::ExpectedExpression => "expected expression, found",
            Self::ExpectedIdent => "expected identifier, found",
            Self::ExpectedEndOfStatement => "expected end of statement, found",
            Self::MissingOpeningBrace => "missing opening brace, found",
            Self::MissingClosingBrace => "missing closing brace, found",
            Self::MissingClosingParen => "missing closing parenthesis, found",
            Self::MissingClosingBracket => "missing closing bracket, found",
            Self::MissingColon => "missing colon, found",
            Self::MissingIn => "missing `in`, found",
            Self::InvalidAssignment => "invalid assignment target",
            Self::InvalidDefer => "defer expects a function call",
            Self::InvalidCase => "expected `case` or `default`, found",
            Self::DefaultNotLast => "`default` must be the last clause of a switch, found",
        })
    }
}

/// A lex or parse failure. The first one aborts the whole unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub msg: ErrorMsg,
    pub symbol: String,
    /// 1-based line number
    pub line: usize,
}

impl SyntaxError {
    pub fn new(msg: ErrorMsg, symbol: impl Into<String>, line: usize) -> Self {
        Self {
            msg,
            symbol: symbol.into(),
            line,
        }
    }

    pub fn at(token: &Token, msg: ErrorMsg) -> Self {
        Self::new(msg, token.to_string(), token.line + 1)
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} `{}`", self.line, self.msg, self.symbol)
    }
}

impl std::error::Error for SyntaxError {}
