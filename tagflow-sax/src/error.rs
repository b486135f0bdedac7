//! Tokenizer error types.

use thiserror::Error;

/// Errors raised while tokenizing a tag/text stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaxError {
    #[error("malformed markup at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("unexpected end of input at offset {offset} inside {construct}")]
    UnexpectedEof { offset: u64, construct: &'static str },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("token too large: {size} bytes (max {max})")]
    TokenTooLarge { size: usize, max: usize },

    #[error("stream already ended")]
    Ended,
}

impl SaxError {
    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            SaxError::Malformed { .. } => "MALFORMED",
            SaxError::UnexpectedEof { .. } => "UNEXPECTED_EOF",
            SaxError::InvalidUtf8 { .. } => "INVALID_UTF8",
            SaxError::TokenTooLarge { .. } => "TOKEN_TOO_LARGE",
            SaxError::Ended => "ENDED",
        }
    }
}
