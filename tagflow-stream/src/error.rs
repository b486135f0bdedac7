//! Stream adapter error types.

use tagflow_core::CoreError;
use tagflow_sax::SaxError;
use thiserror::Error;

/// Errors surfaced from `StreamAdapter::write` and `StreamAdapter::end`.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The machine rejected an action.
    #[error(transparent)]
    Transition(#[from] CoreError),

    /// The event source could not tokenize its input.
    #[error(transparent)]
    Source(#[from] SaxError),

    /// The subscription ended or was detached.
    #[error("stream subscription is closed")]
    Closed,
}

impl StreamError {
    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Transition(e) => e.error_code(),
            StreamError::Source(e) => e.error_code(),
            StreamError::Closed => "CLOSED",
        }
    }

    pub fn is_bad_transition(&self) -> bool {
        matches!(self, StreamError::Transition(e) if e.is_bad_transition())
    }
}
