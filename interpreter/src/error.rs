use std::fmt;

use dncl_core::{report, Kind, LexerError, Token};
use thiserror::Error;

// Lexer, parser and internal failures are host-level errors that stop a run
// before (or outside of) evaluation. Runtime errors are ordinary values
// (`object::RuntimeError` inside `Object::Error`) and never appear here.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum DnclError {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("内部エラー: {message}")]
    Internal { message: String },
}

impl DnclError {
    pub fn explain(&self, source: &str) -> String {
        match self {
            DnclError::Lexer(err) => err.explain(source),
            DnclError::Parser(err) => err.explain(source),
            DnclError::Internal { message } => format!("内部エラー: {}", message),
        }
    }
}

// Every parser failure is keyed by the token it tripped over; the span makes
// the caret rendering, the kind makes the message.
#[derive(Debug, PartialEq, Clone)]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub token: Token,
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParserErrorKind {
    #[error("{expected} が必要ですが '{found}' があります")]
    UnexpectedToken { expected: String, found: String },

    #[error("整数リテラル '{literal}' を解釈できません")]
    InvalidIntLiteral { literal: String },

    #[error("小数リテラル '{literal}' を解釈できません")]
    InvalidFloatLiteral { literal: String },

    #[error("'{literal}' を式の先頭に置くことはできません")]
    UnknownPrefixOperator { literal: String },

    #[error("演算子 '{literal}' をここで使うことはできません")]
    UnknownInfixOperator { literal: String },

    #[error("インデントの深さ {found} が不正です(想定 {expected})")]
    IndentError { expected: usize, found: usize },
}

impl ParserError {
    pub(crate) fn new(kind: ParserErrorKind, token: &Token) -> Self {
        ParserError {
            kind,
            token: token.clone(),
        }
    }

    pub(crate) fn unexpected(token: &Token, expected: &str) -> Self {
        ParserError::new(
            ParserErrorKind::UnexpectedToken {
                expected: String::from(expected),
                found: found_text(token),
            },
            token,
        )
    }

    pub fn explain(&self, source: &str) -> String {
        report::render(
            source,
            self.token.span.start,
            self.token.span.end,
            &self.kind.to_string(),
        )
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ParserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

// Structural tokens have no useful lexeme to quote back at the user.
pub(crate) fn found_text(token: &Token) -> String {
    match token.kind {
        Kind::Eof => String::from("ファイル終端"),
        Kind::NewLine => String::from("行末"),
        Kind::Indent(_) => String::from("インデント"),
        _ => token.lexeme.clone(),
    }
}
