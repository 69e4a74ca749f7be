use thiserror::Error;

use crate::report;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LexerError {
    #[error("予期しない文字 '{ch}' があります")]
    UnexpectedCharacter { ch: char, at: usize },

    #[error("ソースが途中で終わっています")]
    UnexpectedEof { at: usize },
}

impl LexerError {
    // Character offset of the failure in the scanned source.
    pub fn at(&self) -> usize {
        match self {
            LexerError::UnexpectedCharacter { at, .. } => *at,
            LexerError::UnexpectedEof { at } => *at,
        }
    }

    pub fn explain(&self, source: &str) -> String {
        report::render(source, self.at(), self.at() + 1, &self.to_string())
    }
}
